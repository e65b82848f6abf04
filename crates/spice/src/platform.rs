//! Host and target platform description
//!
//! The host platform is an explicit value handed to the path resolver and the
//! pipeline instead of being read from global state, so every platform
//! convention can be exercised from any host.

use crate::diagnostics::{Result, SpiceError};
use crate::env;

/// OS name prefixes that follow POSIX path and executable conventions
const POSIX_OS_PREFIXES: [&str; 11] = [
    "linux", "darwin", "macos", "freebsd", "netbsd", "openbsd", "dragonfly", "android", "ios",
    "solaris", "illumos",
];

/// Executable and path conventions of an operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Posix,
}

impl OsFamily {
    /// Classify an OS component of a target triple.
    ///
    /// Returns `None` for blank or unknown names.
    pub fn classify(os: &str) -> Option<OsFamily> {
        let os = os.trim().to_ascii_lowercase();
        if os.is_empty() {
            return None;
        }
        if os.starts_with("windows") || os.starts_with("win32") || os.starts_with("mingw") {
            Some(OsFamily::Windows)
        } else if POSIX_OS_PREFIXES.iter().any(|p| os.starts_with(p)) {
            Some(OsFamily::Posix)
        } else {
            None
        }
    }

    /// Suffix of executables, including the dot
    pub fn exe_suffix(self) -> &'static str {
        match self {
            OsFamily::Windows => ".exe",
            OsFamily::Posix => "",
        }
    }

    /// Prefix that makes a bare file name relative to the working directory
    pub fn current_dir_prefix(self) -> &'static str {
        match self {
            OsFamily::Windows => ".\\",
            OsFamily::Posix => "./",
        }
    }

    /// Path separator used when composing paths for this family
    pub fn separator(self) -> char {
        match self {
            OsFamily::Windows => '\\',
            OsFamily::Posix => '/',
        }
    }
}

/// The machine spice itself is running on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub arch: String,
    pub vendor: String,
    pub os: String,
    /// `%USERPROFILE%`, only meaningful on Windows hosts
    pub user_profile: Option<String>,
}

impl HostPlatform {
    /// Describe an arbitrary host
    pub fn new(arch: impl Into<String>, vendor: impl Into<String>, os: impl Into<String>) -> Self {
        Self {
            arch: arch.into(),
            vendor: vendor.into(),
            os: os.into(),
            user_profile: None,
        }
    }

    /// Describe the running host
    pub fn detect() -> Self {
        let arch = std::env::consts::ARCH;
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        Self {
            arch: arch.to_string(),
            vendor: default_vendor(arch, os).to_string(),
            os: os.to_string(),
            user_profile: env::get_user_profile(),
        }
    }

    pub fn with_user_profile(mut self, user_profile: impl Into<String>) -> Self {
        self.user_profile = Some(user_profile.into());
        self
    }

    /// OS family of the host, failing if the host OS is not supported
    pub fn os_family(&self) -> Result<OsFamily> {
        OsFamily::classify(&self.os).ok_or_else(|| SpiceError::UnsupportedPlatform {
            os: self.os.clone(),
        })
    }

    /// Fill every blank target component with the host's own value
    pub fn resolve_target(
        &self,
        arch: Option<&str>,
        vendor: Option<&str>,
        os: Option<&str>,
    ) -> ResolvedTarget {
        fn pick(explicit: Option<&str>, host: &str) -> String {
            match explicit.map(str::trim) {
                Some(value) if !value.is_empty() => value.to_string(),
                _ => host.to_string(),
            }
        }
        ResolvedTarget {
            arch: pick(arch, &self.arch),
            vendor: pick(vendor, &self.vendor),
            os: pick(os, &self.os),
        }
    }
}

fn default_vendor(arch: &str, os: &str) -> &'static str {
    match os {
        "windows" => "w64",
        "darwin" | "ios" => "apple",
        _ if arch == "x86_64" || arch == "x86" => "pc",
        _ => "unknown",
    }
}

/// Target platform of one build, every component filled in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub arch: String,
    pub vendor: String,
    pub os: String,
}

impl ResolvedTarget {
    pub fn os_family(&self) -> Result<OsFamily> {
        OsFamily::classify(&self.os).ok_or_else(|| SpiceError::UnsupportedPlatform {
            os: self.os.clone(),
        })
    }

    /// `arch-vendor-os`, as expected by the legacy compiler protocol
    pub fn triple(&self) -> String {
        format!("{}-{}-{}", self.arch, self.vendor, self.os)
    }
}
