//! Diagnostics for the spice crate
//!
//! This module defines the centralized error and warning handling for the spice CLI tool.
//! All fallible operations return `Result<T>` where the error type is `SpiceError`.
//! Warnings are collected using `WarningCollector` and emitted as `SpiceWarn`.

use std::fmt;
use std::path::PathBuf;

/// Result type alias for all fallible operations
pub type Result<T> = std::result::Result<T, SpiceError>;

/// Semantic error type for every failure the build pipeline can surface.
///
/// Tool failures (`Compile`, `Link`) carry the raw combined output of the
/// external process so it can be relayed to the user verbatim.
#[derive(Debug, thiserror::Error)]
pub enum SpiceError {
    /// Compiler or linker executable could not be located
    #[error("{tool} executable not found. {hint}")]
    ToolchainNotFound { tool: String, hint: String },

    /// The compiler exited unsuccessfully
    #[error("Compiler exited with {}\nFailed to compile:\n{output}", exit_label(.exit_code))]
    Compile {
        exit_code: Option<i32>,
        output: String,
    },

    /// The linker exited unsuccessfully
    #[error("Linker exited with {}\nFailed to link:\n{output}", exit_label(.exit_code))]
    Link {
        exit_code: Option<i32>,
        output: String,
    },

    /// No target operating system could be determined
    #[error("Unable to build for target os '{os}'. You have to specify a supported target OS")]
    UnsupportedPlatform { os: String },

    /// A required directory could not be created
    #[error("Could not create directory {path:?}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Walking the object directory failed
    #[error("Unable to search object directory {path:?}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file that should exist is missing
    #[error("File not found: {path:?}")]
    FileNotFound { path: PathBuf },

    /// The command is refused inside a containerized host
    #[error("Cannot run the {command} command in a dockerized environment")]
    RestrictedEnvironment { command: &'static str },

    /// The requested source file does not exist
    #[error("Source file not found: {path:?}")]
    SourceNotFound { path: PathBuf },

    /// Optimization level outside 0..=3
    #[error("Invalid optimization level {level}. Supported levels are 0, 1, 2 and 3")]
    InvalidOptLevel { level: u8 },

    /// A tool invocation was interrupted or timed out
    #[error("{tool} was cancelled: {reason}")]
    Cancelled { tool: String, reason: String },

    /// The tool process could not be started at all
    #[error("Failed to call {tool} executable: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error for a specific file
    #[error("I/O error for file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed configuration file
    #[error("Failed to load config {path:?}: {message}")]
    Config { path: PathBuf, message: String },

    /// Generic error for other failures
    #[error("{message}")]
    Other { message: String },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status code {}", code),
        None => "no status code (terminated by signal)".to_string(),
    }
}

impl SpiceError {
    /// Create an I/O error with context
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        SpiceError::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        SpiceError::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for SpiceError {
    fn from(err: std::io::Error) -> Self {
        SpiceError::Io {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

/// A warning that can be emitted by spice
#[derive(Debug, Clone)]
pub enum SpiceWarn {
    /// Removing intermediate build artifacts failed after a successful build
    Cleanup {
        /// The artifact that could not be removed
        path: PathBuf,
        /// Underlying reason
        reason: String,
    },

    /// The program started by `spice run` exited unsuccessfully
    ProgramExit {
        /// The executed program
        program: PathBuf,
        /// Its exit code, if it exited normally
        code: Option<i32>,
    },

    /// A configuration option has an unusable value and was ignored
    ConfigWarning {
        /// The configuration key
        key: String,
        /// The current value
        value: String,
        /// Description of the issue
        issue: String,
    },
}

impl fmt::Display for SpiceWarn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpiceWarn::Cleanup { path, reason } => {
                write!(
                    f,
                    "Warning: Could not clean up build artifact {}: {}",
                    path.display(),
                    reason
                )
            }
            SpiceWarn::ProgramExit { program, code } => {
                write!(f, "Warning: Program {} exited with ", program.display())?;
                match code {
                    Some(code) => write!(f, "status code {}", code),
                    None => write!(f, "no status code (terminated by signal)"),
                }
            }
            SpiceWarn::ConfigWarning { key, value, issue } => {
                write!(
                    f,
                    "Warning: Configuration '{}' has value '{}' - {}",
                    key, value, issue
                )
            }
        }
    }
}

impl std::error::Error for SpiceWarn {}

/// A collection of warnings that can be accumulated during operations
#[derive(Debug, Clone, Default)]
pub struct WarningCollector {
    warnings: Vec<SpiceWarn>,
}

impl WarningCollector {
    /// Create a new empty warning collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a warning to the collection
    pub fn add(&mut self, warning: SpiceWarn) {
        self.warnings.push(warning);
    }

    /// Move every warning of `other` into this collection
    pub fn extend(&mut self, other: WarningCollector) {
        self.warnings.extend(other.warnings);
    }

    /// Check if any warnings have been collected
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Get the number of warnings
    pub fn count(&self) -> usize {
        self.warnings.len()
    }

    /// Iterate over all warnings
    pub fn iter(&self) -> impl Iterator<Item = &SpiceWarn> {
        self.warnings.iter()
    }

    /// Print all warnings to stderr with appropriate formatting
    pub fn print_all(&self) {
        for warning in self.iter() {
            eprintln!("⚠️  {}", warning);
        }
    }
}
