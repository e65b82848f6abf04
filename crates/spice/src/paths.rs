//! Path derivation for build outputs and installed binaries
//!
//! Every function here is driven by an explicit `HostPlatform` or
//! `ResolvedTarget`, so Windows and POSIX conventions are both available on
//! any host. Paths are composed as strings with the separator of the
//! platform they are meant for.

use std::path::{Path, PathBuf};

use crate::diagnostics::{Result, SpiceError};
use crate::platform::{HostPlatform, OsFamily, ResolvedTarget};

/// Default binary directory on POSIX hosts
pub const POSIX_BIN_DIR: &str = "/usr/local/bin";

/// File name of `source` without directory and extension.
///
/// `source` names a file on this host, so only the host's separators split
/// it: `\` is a separator on Windows and a file name character elsewhere.
pub fn source_stem(source: &Path) -> Result<String> {
    let raw = source.to_string_lossy();
    let file_name = raw.rsplit(std::path::is_separator).next().unwrap_or_default();
    let stem = match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(dot) => &file_name[..dot],
    };
    if stem.is_empty() || stem == "." || stem == ".." {
        return Err(SpiceError::other(format!(
            "Cannot derive an executable name from source path {}",
            source.display()
        )));
    }
    Ok(stem.to_string())
}

/// Path of the executable a build should produce.
///
/// Without an explicit output the executable is named after the source file
/// and placed in the working directory. Windows targets always get `.exe`.
pub fn resolve_output_path(
    source: &Path,
    explicit_output: Option<&Path>,
    target: &ResolvedTarget,
) -> Result<PathBuf> {
    let family = target.os_family()?;
    let mut output = match explicit_output.filter(|p| !p.as_os_str().is_empty()) {
        Some(path) => path.to_string_lossy().into_owned(),
        None => format!("{}{}", family.current_dir_prefix(), source_stem(source)?),
    };
    if family == OsFamily::Windows && !output.to_ascii_lowercase().ends_with(".exe") {
        output.push_str(".exe");
    }
    Ok(PathBuf::from(output))
}

/// Where `source` gets installed on `host`.
///
/// This is the only install path derivation; install and uninstall both go
/// through it. `bin_dir` replaces the platform default directory.
pub fn install_path(source: &Path, host: &HostPlatform, bin_dir: Option<&Path>) -> Result<PathBuf> {
    let family = host.os_family()?;
    let stem = source_stem(source)?;
    let dir = match bin_dir {
        Some(dir) => dir
            .to_string_lossy()
            .trim_end_matches(['/', '\\'])
            .to_string(),
        None => match family {
            OsFamily::Windows => {
                let profile = host.user_profile.as_deref().ok_or_else(|| {
                    SpiceError::other("USERPROFILE is not set, cannot determine the install directory")
                })?;
                format!("{}\\spice\\bin", profile.trim_end_matches(['/', '\\']))
            }
            OsFamily::Posix => POSIX_BIN_DIR.to_string(),
        },
    };
    Ok(PathBuf::from(format!(
        "{}{}{}{}",
        dir,
        family.separator(),
        stem,
        family.exe_suffix()
    )))
}

/// `install_path`, additionally creating the destination directory
pub fn resolve_install_path(
    source: &Path,
    host: &HostPlatform,
    bin_dir: Option<&Path>,
) -> Result<PathBuf> {
    let path = install_path(source, host, bin_dir)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| SpiceError::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(path)
}

/// Private executable location used by `spice run`
pub fn run_output_path(source: &Path, run_dir: &Path, host: &HostPlatform) -> Result<PathBuf> {
    let family = host.os_family()?;
    Ok(run_dir.join(format!("{}{}", source_stem(source)?, family.exe_suffix())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn target(os: &str) -> ResolvedTarget {
        HostPlatform::new("x86_64", "pc", os).resolve_target(None, None, None)
    }

    #[test]
    fn stem_strips_directories_and_extension() {
        assert_eq!(source_stem(Path::new("src/prog.spice")).unwrap(), "prog");
        assert_eq!(source_stem(Path::new("archive.tar.spice")).unwrap(), "archive.tar");
        assert_eq!(source_stem(Path::new("noext")).unwrap(), "noext");
        assert!(source_stem(Path::new("dir/")).is_err());
    }

    #[cfg(windows)]
    #[test]
    fn stem_splits_on_backslash_on_windows() {
        assert_eq!(source_stem(Path::new("C:\\work\\prog.spice")).unwrap(), "prog");
    }

    #[cfg(unix)]
    #[test]
    fn stem_keeps_backslash_on_posix() {
        assert_eq!(source_stem(Path::new("a\\b.spice")).unwrap(), "a\\b");
        let host = HostPlatform::new("x86_64", "pc", "linux");
        assert_eq!(
            install_path(Path::new("src/a\\b.spice"), &host, None).unwrap(),
            PathBuf::from("/usr/local/bin/a\\b")
        );
    }

    #[test]
    fn default_output_follows_target_conventions() {
        for source in ["prog.spice", "nested/dir/prog.spice", "../prog"] {
            let windows = resolve_output_path(Path::new(source), None, &target("windows")).unwrap();
            let posix = resolve_output_path(Path::new(source), None, &target("linux")).unwrap();
            assert_eq!(windows, PathBuf::from(".\\prog.exe"));
            assert_eq!(posix, PathBuf::from("./prog"));
            assert!(!posix.to_string_lossy().ends_with(".exe"));
        }
    }

    #[test]
    fn explicit_output_gets_exe_only_on_windows() {
        let source = Path::new("prog.spice");
        let out = Path::new("bin/app");
        assert_eq!(
            resolve_output_path(source, Some(out), &target("windows")).unwrap(),
            PathBuf::from("bin/app.exe")
        );
        assert_eq!(
            resolve_output_path(source, Some(out), &target("linux")).unwrap(),
            PathBuf::from("bin/app")
        );
        assert_eq!(
            resolve_output_path(source, Some(Path::new("app.exe")), &target("windows")).unwrap(),
            PathBuf::from("app.exe")
        );
    }

    #[test]
    fn empty_explicit_output_counts_as_unset() {
        let out = resolve_output_path(Path::new("prog.spice"), Some(Path::new("")), &target("linux"));
        assert_eq!(out.unwrap(), PathBuf::from("./prog"));
    }

    #[test]
    fn unknown_target_os_is_rejected() {
        let result = resolve_output_path(Path::new("prog.spice"), None, &target(""));
        assert!(matches!(result, Err(SpiceError::UnsupportedPlatform { .. })));
    }

    #[test]
    fn install_path_per_platform() {
        let source = Path::new("../test-files/test-file.spice");
        let linux = HostPlatform::new("x86_64", "pc", "linux");
        assert_eq!(
            install_path(source, &linux, None).unwrap(),
            PathBuf::from("/usr/local/bin/test-file")
        );
        let windows = HostPlatform::new("x86_64", "w64", "windows").with_user_profile("C:\\Users\\dev");
        assert_eq!(
            install_path(source, &windows, None).unwrap(),
            PathBuf::from("C:\\Users\\dev\\spice\\bin\\test-file.exe")
        );
        let no_profile = HostPlatform::new("x86_64", "w64", "windows");
        assert!(install_path(source, &no_profile, None).is_err());
    }

    #[test]
    fn resolve_install_path_creates_directory() {
        let temp = TempDir::new().unwrap();
        let bin_dir = temp.path().join("deep/bin");
        let host = HostPlatform::new("x86_64", "pc", "linux");
        let path = resolve_install_path(Path::new("tool.spice"), &host, Some(&bin_dir)).unwrap();
        assert!(bin_dir.is_dir());
        assert_eq!(path, install_path(Path::new("tool.spice"), &host, Some(&bin_dir)).unwrap());
    }

    #[test]
    fn run_output_lives_in_run_dir() {
        let host = HostPlatform::new("x86_64", "pc", "linux");
        let path = run_output_path(Path::new("src/prog.spice"), Path::new("/tmp/run"), &host).unwrap();
        assert_eq!(path, Path::new("/tmp/run").join("prog"));
    }
}
