//! Environment variable name constants and accessors
//!
//! This module centralizes all environment variable names used throughout
//! the codebase. All environment variables should be accessed through the
//! functions in this module rather than using `std::env::var()` directly.

/// Environment variable names
pub mod names {
    /// Restricted host marker: `SPICE_DOCKERIZED`
    /// Set to "1" inside containers, disables install/uninstall
    pub const DOCKERIZED: &str = "SPICE_DOCKERIZED";

    /// Compiler binary path: `SPICE_COMPILER_PATH`
    /// Overrides the toolchain search for `spicec`
    pub const COMPILER_PATH: &str = "SPICE_COMPILER_PATH";

    /// Linker driver: `SPICE_LINKER`
    /// Name or path of the linker driver (gcc, clang, ...)
    pub const LINKER: &str = "SPICE_LINKER";

    /// Binary directory for installs: `SPICE_INSTALL_DIR`
    pub const INSTALL_DIR: &str = "SPICE_INSTALL_DIR";

    /// Tool timeout in seconds: `SPICE_TOOL_TIMEOUT`
    /// `0` disables the timeout
    pub const TOOL_TIMEOUT: &str = "SPICE_TOOL_TIMEOUT";

    /// Pinned compiler argument protocol: `SPICE_COMPILER_PROTOCOL`
    pub const COMPILER_PROTOCOL: &str = "SPICE_COMPILER_PROTOCOL";

    /// Verbose output: `SPICE_VERBOSE`
    pub const VERBOSE: &str = "SPICE_VERBOSE";

    /// Windows per-user profile directory: `USERPROFILE`
    pub const USER_PROFILE: &str = "USERPROFILE";
}

/// Check if spice runs in a dockerized environment
/// Returns `true` only if `SPICE_DOCKERIZED=1` is set
pub fn is_dockerized() -> bool {
    std::env::var(names::DOCKERIZED)
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Get the compiler path override
/// Returns `None` if not set
pub fn get_compiler_path() -> Option<String> {
    non_empty(names::COMPILER_PATH)
}

/// Get the linker override
/// Returns `None` if not set
pub fn get_linker() -> Option<String> {
    non_empty(names::LINKER)
}

/// Get the install directory override
/// Returns `None` if not set
pub fn get_install_dir() -> Option<String> {
    non_empty(names::INSTALL_DIR)
}

/// Get the raw tool timeout value
/// Returns `None` if not set
pub fn get_tool_timeout() -> Option<String> {
    non_empty(names::TOOL_TIMEOUT)
}

/// Get the raw compiler protocol value
/// Returns `None` if not set
pub fn get_compiler_protocol() -> Option<String> {
    non_empty(names::COMPILER_PROTOCOL)
}

/// Check if verbose output was requested through the environment
pub fn is_verbose() -> bool {
    std::env::var(names::VERBOSE).is_ok()
}

/// Get the Windows user profile directory
/// Returns `None` if not set
pub fn get_user_profile() -> Option<String> {
    non_empty(names::USER_PROFILE)
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
