//! Command-line interface definitions
//!
//! This module contains all clap struct definitions and argument parsing logic
//! for the spice CLI tool. It separates the interface definition from the
//! business logic that executes the commands.

use std::path::PathBuf;

use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};

use crate::env;

#[derive(Parser, Debug)]
#[command(
    name = "spice",
    about = "Build, run and install programs written in Spice",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    /// Print verbose debug information even in release builds
    #[arg(long = "verbose", global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a Spice source file into an executable
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        compile: CompileArgs,

        /// Target architecture for cross-compiling (defaults to the host)
        #[arg(long = "target-arch")]
        target_arch: Option<String>,

        /// Target vendor for cross-compiling (defaults to the host)
        #[arg(long = "target-vendor")]
        target_vendor: Option<String>,

        /// Target operating system for cross-compiling (defaults to the host)
        #[arg(long = "target-os")]
        target_os: Option<String>,

        /// Path to the location where the output executable should go
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        #[command(flatten)]
        display: DisplayArgs,
    },

    /// Build a Spice source file and install the executable on this system
    #[command(visible_alias = "i")]
    Install {
        #[command(flatten)]
        compile: CompileArgs,

        #[command(flatten)]
        display: DisplayArgs,
    },

    /// Build a Spice source file and run the executable (like `cargo run`)
    #[command(visible_alias = "r")]
    Run {
        #[command(flatten)]
        compile: CompileArgs,

        /// Arguments to pass to the executed program (after `--`)
        #[arg(last = true)]
        args: Vec<String>,

        #[command(flatten)]
        display: DisplayArgs,
    },

    /// Remove an executable previously installed with `spice install`
    #[command(visible_alias = "u")]
    Uninstall {
        /// Path to the Spice source file the executable was built from
        source: PathBuf,

        #[command(flatten)]
        display: DisplayArgs,
    },
}

/// Options shared by every command that compiles
#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    /// Path to the Spice source file
    pub source: PathBuf,

    /// Print compiler output for debugging
    #[arg(short = 'd', long = "debug-output")]
    pub debug_output: bool,

    /// Optimization level: 0, 1, 2 or 3
    #[arg(
        short = 'O',
        long = "opt-level",
        default_value_t = 2,
        value_parser = clap::value_parser!(u8).range(0..=3)
    )]
    pub opt_level: u8,

    /// Link the executable statically
    #[arg(long = "static")]
    pub link_static: bool,

    /// Link against the POSIX threads library
    #[arg(long = "pthread")]
    pub use_posix_threads: bool,
}

/// Progress output options
#[derive(Args, Debug, Clone, Default)]
pub struct DisplayArgs {
    /// Suppress progress output
    #[arg(long = "quiet")]
    pub quiet: bool,
    /// Force color output: auto, always, never
    #[arg(long = "color")]
    pub color: Option<String>,
}

/// Parse the process arguments.
///
/// Install and uninstall are hidden from the help output on a restricted
/// (dockerized) host; invoking them there still reports why they refuse.
pub fn parse() -> Cli {
    let mut command = Cli::command();
    if env::is_dockerized() {
        command = command
            .mut_subcommand("install", |sub| sub.hide(true))
            .mut_subcommand("uninstall", |sub| sub.hide(true));
    }
    let matches = command.get_matches();
    Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_build_flags() {
        let cli = Cli::try_parse_from([
            "spice",
            "build",
            "-d",
            "-O",
            "3",
            "--target-os",
            "windows",
            "-o",
            "out/prog",
            "--static",
            "main.spice",
        ])
        .unwrap();
        match cli.cmd {
            Commands::Build {
                compile,
                target_os,
                output,
                ..
            } => {
                assert!(compile.debug_output);
                assert!(compile.link_static);
                assert!(!compile.use_posix_threads);
                assert_eq!(compile.opt_level, 3);
                assert_eq!(target_os.as_deref(), Some("windows"));
                assert_eq!(output, Some(PathBuf::from("out/prog")));
                assert_eq!(compile.source, PathBuf::from("main.spice"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn opt_level_defaults_to_two_and_is_bounded() {
        let cli = Cli::try_parse_from(["spice", "r", "main.spice", "--", "a", "b"]).unwrap();
        match cli.cmd {
            Commands::Run { compile, args, .. } => {
                assert_eq!(compile.opt_level, 2);
                assert_eq!(args, ["a", "b"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["spice", "build", "-O", "4", "main.spice"]).is_err());
    }

    #[test]
    fn short_aliases() {
        let cli = Cli::try_parse_from(["spice", "u", "main.spice", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.cmd, Commands::Uninstall { .. }));
        let cli = Cli::try_parse_from(["spice", "i", "--pthread", "main.spice"]).unwrap();
        assert!(matches!(cli.cmd, Commands::Install { ref compile, .. } if compile.use_posix_threads));
    }
}
