//! Linker interface for final executable linking
//!
//! This module hands the object files emitted by `spicec` to the system
//! linker driver (gcc or clang) to produce the final executable.

use std::path::{Path, PathBuf};

use crate::diagnostics::{Result, SpiceError};
use crate::process::{ProcessResult, ToolRunner};

/// Build the linker driver's argument vector:
/// `-no-pie [-static] [-lpthread] -o <output> <objects...>`
pub fn link_args(
    objects: &[PathBuf],
    output: &Path,
    link_static: bool,
    use_posix_threads: bool,
) -> Vec<String> {
    let mut args = vec!["-no-pie".to_string()];
    if link_static {
        args.push("-static".to_string());
    }
    if use_posix_threads {
        args.push("-lpthread".to_string());
    }
    args.push("-o".to_string());
    args.push(output.to_string_lossy().into_owned());
    args.extend(objects.iter().map(|obj| obj.to_string_lossy().into_owned()));
    args
}

/// Link `objects` into the executable at `output`.
///
/// An empty object set fails without invoking the linker.
pub fn link<R: ToolRunner + ?Sized>(
    runner: &R,
    linker: &Path,
    objects: &[PathBuf],
    output: &Path,
    link_static: bool,
    use_posix_threads: bool,
) -> Result<ProcessResult> {
    if objects.is_empty() {
        return Err(SpiceError::Link {
            exit_code: None,
            output: "The compiler produced no object files, nothing to link".to_string(),
        });
    }

    let args = link_args(objects, output, link_static, use_posix_threads);
    let result = runner.run(linker, &args)?;
    if !result.success() {
        return Err(SpiceError::Link {
            exit_code: result.exit_code,
            output: result.combined_output(),
        });
    }
    Ok(result)
}
