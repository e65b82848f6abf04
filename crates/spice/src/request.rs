//! Build request model

use std::fmt;
use std::path::{Path, PathBuf};

use crate::diagnostics::{Result, SpiceError};

/// Optimization level passed to the compiler, always within 0..=3
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OptLevel(u8);

impl OptLevel {
    pub const MAX: u8 = 3;

    pub fn new(level: u8) -> Result<Self> {
        if level > Self::MAX {
            return Err(SpiceError::InvalidOptLevel { level });
        }
        Ok(Self(level))
    }
}

impl Default for OptLevel {
    fn default() -> Self {
        Self(2)
    }
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything needed to perform one build. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    source_path: PathBuf,
    target_arch: Option<String>,
    target_vendor: Option<String>,
    target_os: Option<String>,
    output_path: Option<PathBuf>,
    debug_output: bool,
    opt_level: OptLevel,
    link_static: bool,
    use_posix_threads: bool,
}

impl BuildRequest {
    pub fn builder(source_path: impl Into<PathBuf>) -> BuildRequestBuilder {
        BuildRequestBuilder {
            source_path: source_path.into(),
            target_arch: None,
            target_vendor: None,
            target_os: None,
            output_path: None,
            debug_output: false,
            opt_level: None,
            link_static: false,
            use_posix_threads: false,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn target_arch(&self) -> Option<&str> {
        self.target_arch.as_deref()
    }

    pub fn target_vendor(&self) -> Option<&str> {
        self.target_vendor.as_deref()
    }

    pub fn target_os(&self) -> Option<&str> {
        self.target_os.as_deref()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn debug_output(&self) -> bool {
        self.debug_output
    }

    pub fn opt_level(&self) -> OptLevel {
        self.opt_level
    }

    pub fn link_static(&self) -> bool {
        self.link_static
    }

    pub fn use_posix_threads(&self) -> bool {
        self.use_posix_threads
    }
}

/// Builder validating a `BuildRequest`
#[derive(Debug, Clone)]
pub struct BuildRequestBuilder {
    source_path: PathBuf,
    target_arch: Option<String>,
    target_vendor: Option<String>,
    target_os: Option<String>,
    output_path: Option<PathBuf>,
    debug_output: bool,
    opt_level: Option<u8>,
    link_static: bool,
    use_posix_threads: bool,
}

impl BuildRequestBuilder {
    pub fn target_arch(mut self, arch: impl Into<Option<String>>) -> Self {
        self.target_arch = blank_to_none(arch.into());
        self
    }

    pub fn target_vendor(mut self, vendor: impl Into<Option<String>>) -> Self {
        self.target_vendor = blank_to_none(vendor.into());
        self
    }

    pub fn target_os(mut self, os: impl Into<Option<String>>) -> Self {
        self.target_os = blank_to_none(os.into());
        self
    }

    pub fn output_path(mut self, output: impl Into<Option<PathBuf>>) -> Self {
        self.output_path = output.into().filter(|p| !p.as_os_str().is_empty());
        self
    }

    pub fn debug_output(mut self, debug_output: bool) -> Self {
        self.debug_output = debug_output;
        self
    }

    /// Unset means the default level 2
    pub fn opt_level(mut self, level: u8) -> Self {
        self.opt_level = Some(level);
        self
    }

    pub fn link_static(mut self, link_static: bool) -> Self {
        self.link_static = link_static;
        self
    }

    pub fn use_posix_threads(mut self, use_posix_threads: bool) -> Self {
        self.use_posix_threads = use_posix_threads;
        self
    }

    /// Validate and freeze the request
    pub fn build(self) -> Result<BuildRequest> {
        if !self.source_path.is_file() {
            return Err(SpiceError::SourceNotFound {
                path: self.source_path,
            });
        }
        let opt_level = match self.opt_level {
            Some(level) => OptLevel::new(level)?,
            None => OptLevel::default(),
        };
        Ok(BuildRequest {
            source_path: self.source_path,
            target_arch: self.target_arch,
            target_vendor: self.target_vendor,
            target_os: self.target_os,
            output_path: self.output_path,
            debug_output: self.debug_output,
            opt_level,
            link_static: self.link_static,
            use_posix_threads: self.use_posix_threads,
        })
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn source(temp: &TempDir) -> PathBuf {
        let path = temp.path().join("prog.spice");
        fs::write(&path, "f<int> main() { return 0; }").unwrap();
        path
    }

    #[test]
    fn defaults() {
        let temp = TempDir::new().unwrap();
        let request = BuildRequest::builder(source(&temp)).build().unwrap();
        assert_eq!(request.opt_level().to_string(), "2");
        assert!(!request.debug_output());
        assert!(!request.link_static());
        assert!(!request.use_posix_threads());
        assert_eq!(request.output_path(), None);
        assert_eq!(request.target_os(), None);
    }

    #[test]
    fn blank_targets_are_unset() {
        let temp = TempDir::new().unwrap();
        let request = BuildRequest::builder(source(&temp))
            .target_arch(" ".to_string())
            .target_os("windows".to_string())
            .output_path(PathBuf::new())
            .build()
            .unwrap();
        assert_eq!(request.target_arch(), None);
        assert_eq!(request.target_os(), Some("windows"));
        assert_eq!(request.output_path(), None);
    }

    #[test]
    fn rejects_out_of_range_opt_level() {
        let temp = TempDir::new().unwrap();
        let err = BuildRequest::builder(source(&temp))
            .opt_level(4)
            .build()
            .unwrap_err();
        assert!(matches!(err, SpiceError::InvalidOptLevel { level: 4 }));
    }

    #[test]
    fn rejects_missing_source() {
        let temp = TempDir::new().unwrap();
        let err = BuildRequest::builder(temp.path().join("missing.spice"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SpiceError::SourceNotFound { .. }));
        // A directory is not a source file either
        let err = BuildRequest::builder(temp.path()).build().unwrap_err();
        assert!(matches!(err, SpiceError::SourceNotFound { .. }));
    }
}
