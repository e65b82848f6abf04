//! Build pipeline orchestration
//!
//! This module sequences the build stages (validate, prepare, locate,
//! compile, scan, link) and implements the four user-facing workflows on top
//! of them: build, install, run and uninstall. Every build compiles into a
//! request-scoped working directory, which is removed after a successful
//! link and kept for diagnosis when a tool fails.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use colored::Colorize;
use tempfile::TempDir;

use crate::compiler;
use crate::config::Settings;
use crate::diagnostics::{Result, SpiceError, SpiceWarn, WarningCollector};
use crate::linker;
use crate::objects::find_object_files;
use crate::paths;
use crate::platform::{HostPlatform, ResolvedTarget};
use crate::process::{SystemRunner, ToolRunner};
use crate::request::BuildRequest;
use crate::toolchain::{self, SearchLocations};

/// Prefix of per-build working directories
const WORK_DIR_PREFIX: &str = "spice-output-";

/// Prefix of the private directory `run` builds into
const RUN_DIR_PREFIX: &str = "spice-executable-";

/// Pipeline stage a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Validate,
    Prepare,
    Locate,
    Compile,
    Scan,
    Link,
}

impl Stage {
    /// Whether the working directory may hold intermediate artifacts when
    /// this stage fails
    fn leaves_artifacts(self) -> bool {
        matches!(self, Stage::Compile | Stage::Scan | Stage::Link)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validation",
            Stage::Prepare => "preparation",
            Stage::Locate => "toolchain lookup",
            Stage::Compile => "compilation",
            Stage::Scan => "object discovery",
            Stage::Link => "linking",
        };
        f.write_str(name)
    }
}

/// A failed pipeline run. Stages after `stage` were skipped.
#[derive(Debug, thiserror::Error)]
#[error("Build failed during {stage}")]
pub struct BuildFailure {
    pub stage: Stage,
    #[source]
    pub error: SpiceError,
    /// Working directory kept for inspection
    pub work_dir: Option<PathBuf>,
}

impl BuildFailure {
    fn new(stage: Stage, error: SpiceError) -> Self {
        Self {
            stage,
            error,
            work_dir: None,
        }
    }
}

/// A failed `run`: either the build failed, or the build succeeded and the
/// program could not be executed to completion
#[derive(Debug, thiserror::Error)]
pub enum RunFailure {
    #[error(transparent)]
    Build(#[from] BuildFailure),

    #[error("Build succeeded, but running {} failed", .program.display())]
    Program {
        program: PathBuf,
        #[source]
        error: SpiceError,
    },
}

/// Result of a successful build or install
#[derive(Debug)]
pub struct BuildOutcome {
    pub output_path: PathBuf,
    pub warnings: WarningCollector,
}

/// Result of `run`: the build succeeded and the program was executed
#[derive(Debug)]
pub struct RunOutcome {
    pub output_path: PathBuf,
    /// `None` when the program was terminated by a signal
    pub exit_code: Option<i32>,
    pub warnings: WarningCollector,
}

/// Drives the toolchain for build, install, run and uninstall
pub struct Pipeline<R: ToolRunner = SystemRunner> {
    host: HostPlatform,
    settings: Settings,
    runner: R,
    locations: SearchLocations,
    verbose: bool,
    quiet: bool,
}

impl<R: ToolRunner> Pipeline<R> {
    pub fn new(host: HostPlatform, settings: Settings, runner: R) -> Self {
        Self {
            host,
            settings,
            runner,
            locations: SearchLocations::from_host(),
            verbose: false,
            quiet: false,
        }
    }

    /// Replace where the compiler and linker are searched for
    pub fn with_locations(mut self, locations: SearchLocations) -> Self {
        self.locations = locations;
        self
    }

    /// `verbose` also prints every tool command line, `quiet` silences progress
    pub fn with_output(mut self, verbose: bool, quiet: bool) -> Self {
        self.verbose = verbose;
        self.quiet = quiet;
        self
    }

    /// Compile and link `request` into its resolved output path
    pub fn build(&self, request: &BuildRequest) -> std::result::Result<BuildOutcome, BuildFailure> {
        let target = self.host.resolve_target(
            request.target_arch(),
            request.target_vendor(),
            request.target_os(),
        );
        let output = paths::resolve_output_path(request.source_path(), request.output_path(), &target)
            .map_err(|e| BuildFailure::new(Stage::Validate, e))?;
        self.build_to(request, &target, output)
    }

    /// Build `request` for the host and place the result in the install
    /// directory
    pub fn install(&self, request: &BuildRequest) -> std::result::Result<BuildOutcome, BuildFailure> {
        self.ensure_unrestricted("install")
            .map_err(|e| BuildFailure::new(Stage::Validate, e))?;
        let output = paths::resolve_install_path(
            request.source_path(),
            &self.host,
            self.settings.install_dir.as_deref(),
        )
        .map_err(|e| {
            let stage = match e {
                SpiceError::DirectoryCreate { .. } => Stage::Prepare,
                _ => Stage::Validate,
            };
            BuildFailure::new(stage, e)
        })?;
        let target = self.host.resolve_target(None, None, None);
        self.build_to(request, &target, output)
    }

    /// Build `request` for the host into a private directory and execute it
    /// with `args`, inheriting the standard streams.
    ///
    /// A non-zero exit of the program is reported as a warning; the exit code
    /// is handed back to the caller.
    pub fn run(
        &self,
        request: &BuildRequest,
        args: &[String],
    ) -> std::result::Result<RunOutcome, RunFailure> {
        let run_dir = self
            .create_scoped_dir(RUN_DIR_PREFIX)
            .map_err(|e| BuildFailure::new(Stage::Prepare, e))?;
        let output = paths::run_output_path(request.source_path(), run_dir.path(), &self.host)
            .map_err(|e| BuildFailure::new(Stage::Validate, e))?;
        let target = self.host.resolve_target(None, None, None);

        let BuildOutcome {
            output_path,
            mut warnings,
        } = self.build_to(request, &target, output)?;

        self.progress(format!("Running {}", output_path.display()).blue());
        self.trace_command(&output_path, args);
        let exit_code = self
            .runner
            .run_interactive(&output_path, args)
            .map_err(|error| RunFailure::Program {
                program: output_path.clone(),
                error,
            })?;
        if exit_code != Some(0) {
            warnings.add(SpiceWarn::ProgramExit {
                program: output_path.clone(),
                code: exit_code,
            });
        }

        let run_dir_path = run_dir.path().to_path_buf();
        if let Err(e) = run_dir.close() {
            warnings.add(SpiceWarn::Cleanup {
                path: run_dir_path,
                reason: e.to_string(),
            });
        }

        Ok(RunOutcome {
            output_path,
            exit_code,
            warnings,
        })
    }

    /// Remove the binary `install` produced for `source`.
    ///
    /// Only the file name of `source` matters; the source itself need not
    /// exist anymore.
    pub fn uninstall(&self, source: &Path) -> Result<PathBuf> {
        self.ensure_unrestricted("uninstall")?;
        let path = paths::install_path(source, &self.host, self.settings.install_dir.as_deref())?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(path),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SpiceError::FileNotFound { path }),
            Err(e) => Err(SpiceError::io(path, e)),
        }
    }

    fn ensure_unrestricted(&self, command: &'static str) -> Result<()> {
        if self.settings.restricted {
            return Err(SpiceError::RestrictedEnvironment { command });
        }
        Ok(())
    }

    /// Run every stage from preparation to linking for an already resolved
    /// output path
    fn build_to(
        &self,
        request: &BuildRequest,
        target: &ResolvedTarget,
        output: PathBuf,
    ) -> std::result::Result<BuildOutcome, BuildFailure> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| {
                BuildFailure::new(
                    Stage::Prepare,
                    SpiceError::DirectoryCreate {
                        path: parent.to_path_buf(),
                        source,
                    },
                )
            })?;
        }
        let work_dir = self
            .create_scoped_dir(WORK_DIR_PREFIX)
            .map_err(|e| BuildFailure::new(Stage::Prepare, e))?;

        if let Err((stage, error)) = self.compile_and_link(request, target, work_dir.path(), &output) {
            let work_dir = if stage.leaves_artifacts() {
                Some(work_dir.keep())
            } else {
                None
            };
            return Err(BuildFailure {
                stage,
                error,
                work_dir,
            });
        }

        let mut warnings = WarningCollector::new();
        let work_dir_path = work_dir.path().to_path_buf();
        if let Err(e) = work_dir.close() {
            warnings.add(SpiceWarn::Cleanup {
                path: work_dir_path,
                reason: e.to_string(),
            });
        }

        self.progress(format!("Build complete: {}", output.display()).green());
        Ok(BuildOutcome {
            output_path: output,
            warnings,
        })
    }

    fn compile_and_link(
        &self,
        request: &BuildRequest,
        target: &ResolvedTarget,
        object_dir: &Path,
        output: &Path,
    ) -> std::result::Result<(), (Stage, SpiceError)> {
        let compiler = toolchain::locate_compiler(self.settings.compiler_path.as_deref(), &self.locations)
            .map_err(|e| (Stage::Locate, e))?;
        let protocol = self.settings.compiler_protocol;

        self.progress(
            format!(
                "Compiling {} for {}...",
                request.source_path().display(),
                target.triple()
            )
            .blue(),
        );
        if self.verbose {
            let args = compiler::compiler_args(protocol, request, target, object_dir)
                .map_err(|e| (Stage::Compile, e))?;
            self.trace_command(&compiler, &args);
        }
        let compiled = compiler::compile(&self.runner, &compiler, request, target, object_dir, protocol)
            .map_err(|e| (Stage::Compile, e))?;
        if request.debug_output() {
            print!("{}", compiled.combined_output());
        }

        let objects = find_object_files(object_dir).map_err(|e| (Stage::Scan, e))?;
        if self.verbose {
            eprintln!("Found {} object file(s) in {}", objects.len(), object_dir.display());
        }

        let linker_path = toolchain::locate_linker(
            self.settings.linker.as_deref(),
            self.locations.search_path.as_deref(),
        )
        .map_err(|e| (Stage::Locate, e))?;

        self.progress("Linking executable...".blue());
        if self.verbose {
            let args = linker::link_args(
                &objects,
                output,
                request.link_static(),
                request.use_posix_threads(),
            );
            self.trace_command(&linker_path, &args);
        }
        linker::link(
            &self.runner,
            &linker_path,
            &objects,
            output,
            request.link_static(),
            request.use_posix_threads(),
        )
        .map_err(|e| (Stage::Link, e))?;
        Ok(())
    }

    /// Unique directory below the configured work directory, or the system
    /// temp directory
    fn create_scoped_dir(&self, prefix: &str) -> Result<TempDir> {
        let parent = match &self.settings.work_dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|source| SpiceError::DirectoryCreate {
                    path: dir.clone(),
                    source,
                })?;
                dir.clone()
            }
            None => std::env::temp_dir(),
        };
        tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(&parent)
            .map_err(|source| SpiceError::DirectoryCreate {
                path: parent,
                source,
            })
    }

    fn progress(&self, message: colored::ColoredString) {
        if !self.quiet && (self.verbose || cfg!(debug_assertions)) {
            eprintln!("{}", message);
        }
    }

    fn trace_command(&self, program: &Path, args: &[String]) {
        if self.verbose {
            eprintln!("Command: {} {}", program.display(), args.join(" "));
        }
    }
}
