//! Command handlers for the spice CLI
//!
//! This module contains the implementation of all CLI commands. Handlers
//! return the process exit code; fatal errors are handed back to `main`.

use std::path::Path;

use anyhow::Result;
use atty::Stream as AtStream;
use colored::Colorize;

use crate::cli::{Cli, Commands, CompileArgs, DisplayArgs};
use crate::config::{Config, Settings};
use crate::diagnostics::WarningCollector;
use crate::env;
use crate::pipeline::{BuildFailure, Pipeline, RunFailure, Stage};
use crate::platform::HostPlatform;
use crate::process::{CancelToken, SystemRunner};
use crate::request::{BuildRequest, BuildRequestBuilder};

/// Helper function to determine verbosity and color settings
fn get_verbosity_and_color(cli: &Cli, color: Option<&str>) -> bool {
    let verbose = cli.verbose || env::is_verbose();

    let enable_color = match color {
        Some("always") => true,
        Some("never") => false,
        Some("auto") | None => atty::is(AtStream::Stderr),
        _ => atty::is(AtStream::Stderr),
    };
    colored::control::set_override(enable_color);

    verbose
}

/// Dispatch the parsed command line
pub fn dispatch(cli: &Cli) -> Result<i32> {
    match &cli.cmd {
        Commands::Build {
            compile,
            target_arch,
            target_vendor,
            target_os,
            output,
            display,
        } => {
            let request = request_builder(compile)
                .target_arch(target_arch.clone())
                .target_vendor(target_vendor.clone())
                .target_os(target_os.clone())
                .output_path(output.clone());
            handle_build(cli, request, display)
        }
        Commands::Install { compile, display } => {
            handle_install(cli, request_builder(compile), display)
        }
        Commands::Run {
            compile,
            args,
            display,
        } => handle_run(cli, request_builder(compile), args, display),
        Commands::Uninstall { source, display } => handle_uninstall(cli, source, display),
    }
}

fn request_builder(compile: &CompileArgs) -> BuildRequestBuilder {
    BuildRequest::builder(compile.source.clone())
        .debug_output(compile.debug_output)
        .opt_level(compile.opt_level)
        .link_static(compile.link_static)
        .use_posix_threads(compile.use_posix_threads)
}

/// Handle the build command
pub fn handle_build(cli: &Cli, request: BuildRequestBuilder, display: &DisplayArgs) -> Result<i32> {
    let verbose = get_verbosity_and_color(cli, display.color.as_deref());
    let (pipeline, mut warnings) = create_pipeline(verbose, display.quiet)?;
    let request = request.build()?;

    let outcome = pipeline.build(&request).map_err(report_failure)?;
    warnings.extend(outcome.warnings);
    warnings.print_all();

    if !display.quiet {
        println!(
            "{}",
            format!("Successfully built {}", outcome.output_path.display()).green()
        );
    }
    Ok(0)
}

/// Handle the install command
pub fn handle_install(
    cli: &Cli,
    request: BuildRequestBuilder,
    display: &DisplayArgs,
) -> Result<i32> {
    let verbose = get_verbosity_and_color(cli, display.color.as_deref());
    let (pipeline, mut warnings) = create_pipeline(verbose, display.quiet)?;
    let request = request.build()?;

    if !display.quiet && (verbose || cfg!(debug_assertions)) {
        eprintln!("{}", "Installing executable...".blue());
    }
    let outcome = pipeline.install(&request).map_err(report_failure)?;
    warnings.extend(outcome.warnings);
    warnings.print_all();

    if !display.quiet {
        println!(
            "{}",
            format!("Successfully installed to {}", outcome.output_path.display()).green()
        );
    }
    Ok(0)
}

/// Handle the run command
pub fn handle_run(
    cli: &Cli,
    request: BuildRequestBuilder,
    args: &[String],
    display: &DisplayArgs,
) -> Result<i32> {
    let verbose = get_verbosity_and_color(cli, display.color.as_deref());
    let (pipeline, mut warnings) = create_pipeline(verbose, display.quiet)?;
    let request = request.build()?;

    let outcome = pipeline.run(&request, args).map_err(|failure| match failure {
        RunFailure::Build(failure) => report_failure(failure),
        program_failure => program_failure.into(),
    })?;
    warnings.extend(outcome.warnings);
    warnings.print_all();

    // A program killed by a signal has no exit code of its own
    Ok(outcome.exit_code.unwrap_or(1))
}

/// Handle the uninstall command
pub fn handle_uninstall(cli: &Cli, source: &Path, display: &DisplayArgs) -> Result<i32> {
    let verbose = get_verbosity_and_color(cli, display.color.as_deref());
    let (pipeline, warnings) = create_pipeline(verbose, display.quiet)?;
    warnings.print_all();

    let removed = pipeline.uninstall(source)?;
    if !display.quiet {
        println!(
            "{}",
            format!("Successfully uninstalled {}", removed.display()).green()
        );
    }
    Ok(0)
}

/// Load configuration and wire up the system tool runner
fn create_pipeline(verbose: bool, quiet: bool) -> Result<(Pipeline, WarningCollector)> {
    let mut warnings = WarningCollector::new();
    let config = Config::load(&mut warnings)?;
    let settings = Settings::from_config(&config, &mut warnings);

    if verbose && let Some(path) = Config::config_path() {
        eprintln!("Config file: {}", path.display());
    }
    if verbose {
        eprintln!(
            "Compiler protocol: {}, tool timeout: {}",
            settings.compiler_protocol,
            settings
                .timeout
                .map(|t| format!("{}s", t.as_secs()))
                .unwrap_or_else(|| "none".to_string())
        );
    }

    let cancel = CancelToken::new();
    cancel.install_interrupt_handler()?;
    let runner = SystemRunner::new(settings.timeout, cancel);
    let pipeline = Pipeline::new(HostPlatform::detect(), settings, runner).with_output(verbose, quiet);
    Ok((pipeline, warnings))
}

/// Point the user at kept intermediate files before the failure propagates
fn report_failure(failure: BuildFailure) -> anyhow::Error {
    if let Some(work_dir) = &failure.work_dir {
        eprintln!(
            "{}",
            format!("Intermediate files kept in {}", work_dir.display()).yellow()
        );
    }
    match failure.stage {
        // Nothing ran yet, the underlying error says it all
        Stage::Validate | Stage::Prepare => failure.error.into(),
        _ => failure.into(),
    }
}
