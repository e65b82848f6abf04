//! Configuration management
//!
//! This module handles loading spice configuration from
//! ~/.spice/config.toml and environment variables, and resolving it into the
//! `Settings` the pipeline runs with.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compiler::CompilerProtocol;
use crate::diagnostics::{Result, SpiceError, SpiceWarn, WarningCollector};
use crate::env;

/// Tool timeout applied when nothing else is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Global configuration for spice
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path to the spicec compiler binary
    pub compiler_path: Option<String>,
    /// Linker driver to use (name or path)
    pub linker: Option<String>,
    /// Directory `spice install` places binaries in
    pub install_dir: Option<String>,
    /// Parent directory of per-build working directories
    pub work_dir: Option<String>,
    /// Upper bound for every tool run in seconds, `0` disables it
    pub timeout_secs: Option<u64>,
    /// Argument layout of the compiler, 1 or 2
    pub compiler_protocol: Option<u8>,
}

/// Raw values of the environment variables that override the config file
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub compiler_path: Option<String>,
    pub linker: Option<String>,
    pub install_dir: Option<String>,
    pub timeout: Option<String>,
    pub compiler_protocol: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            compiler_path: env::get_compiler_path(),
            linker: env::get_linker(),
            install_dir: env::get_install_dir(),
            timeout: env::get_tool_timeout(),
            compiler_protocol: env::get_compiler_protocol(),
        }
    }
}

impl Config {
    /// Load configuration from ~/.spice/config.toml and environment variables.
    ///
    /// A missing file means defaults; a malformed one is an error.
    pub fn load(warnings: &mut WarningCollector) -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(EnvOverrides::from_env(), warnings);
        Ok(config)
    }

    /// Load configuration from `path`, defaults if it does not exist
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| SpiceError::io(path, e))?;
        Self::from_toml(&content, path)
    }

    /// Parse configuration text; `origin` is only used in error messages
    pub fn from_toml(content: &str, origin: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| SpiceError::Config {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".spice").join("config.toml"))
    }

    /// Let set environment variables take precedence over file values.
    /// Unparsable numeric values are reported and ignored.
    pub fn apply_overrides(&mut self, overrides: EnvOverrides, warnings: &mut WarningCollector) {
        if let Some(path) = overrides.compiler_path {
            self.compiler_path = Some(path);
        }
        if let Some(linker) = overrides.linker {
            self.linker = Some(linker);
        }
        if let Some(dir) = overrides.install_dir {
            self.install_dir = Some(dir);
        }
        if let Some(raw) = overrides.timeout {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.timeout_secs = Some(secs),
                Err(_) => warnings.add(SpiceWarn::ConfigWarning {
                    key: env::names::TOOL_TIMEOUT.to_string(),
                    value: raw,
                    issue: "expected a number of seconds, ignoring".to_string(),
                }),
            }
        }
        if let Some(raw) = overrides.compiler_protocol {
            match raw.parse::<CompilerProtocol>() {
                Ok(CompilerProtocol::V1) => self.compiler_protocol = Some(1),
                Ok(CompilerProtocol::V2) => self.compiler_protocol = Some(2),
                Err(_) => warnings.add(SpiceWarn::ConfigWarning {
                    key: env::names::COMPILER_PROTOCOL.to_string(),
                    value: raw,
                    issue: "expected 1 or 2, ignoring".to_string(),
                }),
            }
        }
    }
}

/// Effective settings of one spice invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub compiler_path: Option<PathBuf>,
    pub linker: Option<String>,
    pub install_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    /// `None` lets tools run indefinitely
    pub timeout: Option<Duration>,
    pub compiler_protocol: CompilerProtocol,
    /// Install and uninstall are refused on a restricted (dockerized) host
    pub restricted: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            compiler_path: None,
            linker: None,
            install_dir: None,
            work_dir: None,
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            compiler_protocol: CompilerProtocol::default(),
            restricted: false,
        }
    }
}

impl Settings {
    /// Resolve a loaded `Config` against the running environment
    pub fn from_config(config: &Config, warnings: &mut WarningCollector) -> Self {
        Self::resolve(config, env::is_dockerized(), warnings)
    }

    pub fn resolve(config: &Config, restricted: bool, warnings: &mut WarningCollector) -> Self {
        let compiler_protocol = match config.compiler_protocol {
            None | Some(2) => CompilerProtocol::V2,
            Some(1) => CompilerProtocol::V1,
            Some(other) => {
                warnings.add(SpiceWarn::ConfigWarning {
                    key: "compiler_protocol".to_string(),
                    value: other.to_string(),
                    issue: format!("unknown protocol, using {}", CompilerProtocol::default()),
                });
                CompilerProtocol::default()
            }
        };
        let timeout = match config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self {
            compiler_path: non_blank(&config.compiler_path).map(PathBuf::from),
            linker: non_blank(&config.linker).map(str::to_string),
            install_dir: non_blank(&config.install_dir).map(PathBuf::from),
            work_dir: non_blank(&config.work_dir).map(PathBuf::from),
            timeout,
            compiler_protocol,
            restricted,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
