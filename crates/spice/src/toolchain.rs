//! Toolchain discovery
//!
//! Finds the `spicec` compiler and the system linker driver. The compiler
//! is looked up next to the running binary, in the fixed system install
//! directory, and on the command search path. The linker is only ever looked
//! up on the command search path.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::diagnostics::{Result, SpiceError};

/// Name of the compiler executable
pub const COMPILER_EXECUTABLE_NAME: &str = "spicec";

/// Fixed system installation directory of the toolchain
pub const SYSTEM_INSTALL_DIR: &str = "/usr/lib/spice";

/// Linker drivers tried in order when none is configured
pub const LINKER_CANDIDATES: [&str; 2] = ["gcc", "clang"];

const COMPILER_HINT: &str = "Please check your installation / re-install Spice";
const LINKER_HINT: &str = "Please make sure you have the package 'build-essential' (containing gcc) or clang installed";

/// Places the toolchain locator looks at
#[derive(Debug, Clone, Default)]
pub struct SearchLocations {
    /// Directory containing the running binary
    pub exe_dir: Option<PathBuf>,
    /// System installation directory, consulted only if it exists
    pub system_dir: Option<PathBuf>,
    /// Value of the command search path (`PATH`)
    pub search_path: Option<OsString>,
}

impl SearchLocations {
    /// Locations of the running process
    pub fn from_host() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        let system_dir = if cfg!(unix) {
            Some(PathBuf::from(SYSTEM_INSTALL_DIR))
        } else {
            None
        };
        Self {
            exe_dir,
            system_dir,
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Only search the given `PATH` value
    pub fn search_path_only(search_path: impl Into<OsString>) -> Self {
        Self {
            exe_dir: None,
            system_dir: None,
            search_path: Some(search_path.into()),
        }
    }
}

/// Locate the executable `name`.
///
/// The system install directory takes precedence over the directory of the
/// running binary when it exists; the command search path comes last.
pub fn locate_executable(name: &str, locations: &SearchLocations) -> Result<PathBuf> {
    let file_name = executable_file_name(name);
    let system_dir = locations.system_dir.as_ref().filter(|dir| dir.is_dir());
    for dir in system_dir.into_iter().chain(locations.exe_dir.as_ref()) {
        let candidate = dir.join(&file_name);
        if is_executable(&candidate) {
            return Ok(candidate);
        }
    }
    search_path(name, locations.search_path.as_deref()).ok_or_else(|| {
        SpiceError::ToolchainNotFound {
            tool: name.to_string(),
            hint: COMPILER_HINT.to_string(),
        }
    })
}

/// Locate the compiler, honoring an explicit override
pub fn locate_compiler(explicit: Option<&Path>, locations: &SearchLocations) -> Result<PathBuf> {
    match explicit {
        Some(path) => resolve_explicit(path, locations.search_path.as_deref()).ok_or_else(|| {
            SpiceError::ToolchainNotFound {
                tool: path.display().to_string(),
                hint: format!("The configured compiler path does not exist. {}", COMPILER_HINT),
            }
        }),
        None => locate_executable(COMPILER_EXECUTABLE_NAME, locations),
    }
}

/// Locate the linker driver on the command search path.
///
/// A configured linker is used as-is; otherwise the first available of
/// `LINKER_CANDIDATES` wins.
pub fn locate_linker(preferred: Option<&str>, search_path_value: Option<&OsStr>) -> Result<PathBuf> {
    if let Some(preferred) = preferred {
        return resolve_explicit(Path::new(preferred), search_path_value).ok_or_else(|| {
            SpiceError::ToolchainNotFound {
                tool: preferred.to_string(),
                hint: LINKER_HINT.to_string(),
            }
        });
    }
    LINKER_CANDIDATES
        .iter()
        .find_map(|candidate| search_path(candidate, search_path_value))
        .ok_or_else(|| SpiceError::ToolchainNotFound {
            tool: LINKER_CANDIDATES[0].to_string(),
            hint: LINKER_HINT.to_string(),
        })
}

/// A path with a directory component must point at an executable; a bare
/// name is looked up on the search path.
fn resolve_explicit(path: &Path, search_path_value: Option<&OsStr>) -> Option<PathBuf> {
    if path.components().count() > 1 {
        return is_executable(path).then(|| path.to_path_buf());
    }
    search_path(&path.to_string_lossy(), search_path_value)
}

fn search_path(name: &str, search_path_value: Option<&OsStr>) -> Option<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    which::which_in(name, search_path_value, cwd).ok()
}

fn executable_file_name(name: &str) -> String {
    if cfg!(windows) && !name.ends_with(".exe") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
