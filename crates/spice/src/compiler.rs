//! Compiler interface for spicec
//!
//! This module builds the positional argument vector expected by `spicec`
//! and invokes it through a `ToolRunner`. The argument layout is a versioned
//! contract: the protocol is pinned by configuration, never guessed from
//! which request fields happen to be set.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::diagnostics::{Result, SpiceError};
use crate::paths::source_stem;
use crate::platform::ResolvedTarget;
use crate::process::{ProcessResult, ToolRunner};
use crate::request::BuildRequest;

/// Argument layout understood by the external compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompilerProtocol {
    /// `<source> <triple> <object file> <debug> <opt level>`
    V1,
    /// `<source> <arch> <vendor> <os> <object dir> <debug> <opt level>`
    #[default]
    V2,
}

impl FromStr for CompilerProtocol {
    type Err = SpiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches(['v', 'V']) {
            "1" => Ok(CompilerProtocol::V1),
            "2" => Ok(CompilerProtocol::V2),
            other => Err(SpiceError::other(format!(
                "Unknown compiler protocol '{}'. Supported protocols are 1 and 2",
                other
            ))),
        }
    }
}

impl fmt::Display for CompilerProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompilerProtocol::V1 => write!(f, "1"),
            CompilerProtocol::V2 => write!(f, "2"),
        }
    }
}

/// Build the compiler's argument vector, e.g.
/// `spicec ./main.spice x86_64 w64 windows /tmp/spice-output-x true 3`
pub fn compiler_args(
    protocol: CompilerProtocol,
    request: &BuildRequest,
    target: &ResolvedTarget,
    object_dir: &Path,
) -> Result<Vec<String>> {
    let source = request.source_path().to_string_lossy().into_owned();
    let debug = request.debug_output().to_string();
    let opt_level = request.opt_level().to_string();

    let args = match protocol {
        CompilerProtocol::V1 => {
            let object_file = object_dir.join(format!("{}.o", source_stem(request.source_path())?));
            vec![
                source,
                target.triple(),
                object_file.to_string_lossy().into_owned(),
                debug,
                opt_level,
            ]
        }
        CompilerProtocol::V2 => vec![
            source,
            target.arch.clone(),
            target.vendor.clone(),
            target.os.clone(),
            object_dir.to_string_lossy().into_owned(),
            debug,
            opt_level,
        ],
    };
    Ok(args)
}

/// Invoke the compiler, emitting object code into `object_dir`.
///
/// A non-zero exit becomes `SpiceError::Compile` carrying the combined
/// output verbatim. On success the result is returned so callers can show
/// the output when debug output was requested.
pub fn compile<R: ToolRunner + ?Sized>(
    runner: &R,
    compiler: &Path,
    request: &BuildRequest,
    target: &ResolvedTarget,
    object_dir: &Path,
    protocol: CompilerProtocol,
) -> Result<ProcessResult> {
    let args = compiler_args(protocol, request, target, object_dir)?;
    let result = runner.run(compiler, &args)?;
    if !result.success() {
        return Err(SpiceError::Compile {
            exit_code: result.exit_code,
            output: result.combined_output(),
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HostPlatform;
    use std::cell::RefCell;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct CannedRunner {
        result: ProcessResult,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl ToolRunner for CannedRunner {
        fn run(&self, _program: &Path, args: &[String]) -> Result<ProcessResult> {
            self.calls.borrow_mut().push(args.to_vec());
            Ok(self.result.clone())
        }

        fn run_interactive(&self, _program: &Path, _args: &[String]) -> Result<Option<i32>> {
            unreachable!("the compiler is never run interactively")
        }
    }

    fn request(temp: &TempDir, debug: bool, opt: u8) -> BuildRequest {
        let source = temp.path().join("prog.spice");
        fs::write(&source, "").unwrap();
        BuildRequest::builder(source)
            .debug_output(debug)
            .opt_level(opt)
            .build()
            .unwrap()
    }

    fn target() -> ResolvedTarget {
        HostPlatform::new("x86_64", "w64", "windows").resolve_target(None, None, None)
    }

    #[test]
    fn v2_args_are_seven_positionals_in_order() {
        let temp = TempDir::new().unwrap();
        let request = request(&temp, true, 3);
        let object_dir = PathBuf::from("/tmp/spice-output-abc");
        let args = compiler_args(CompilerProtocol::V2, &request, &target(), &object_dir).unwrap();
        assert_eq!(args.len(), 7);
        assert_eq!(args[0], request.source_path().to_string_lossy());
        assert_eq!(
            &args[1..],
            ["x86_64", "w64", "windows", "/tmp/spice-output-abc", "true", "3"]
        );
    }

    #[test]
    fn v1_args_use_triple_and_object_file() {
        let temp = TempDir::new().unwrap();
        let request = request(&temp, false, 0);
        let object_dir = PathBuf::from("/tmp/objs");
        let args = compiler_args(CompilerProtocol::V1, &request, &target(), &object_dir).unwrap();
        assert_eq!(args.len(), 5);
        assert_eq!(args[1], "x86_64-w64-windows");
        assert_eq!(PathBuf::from(&args[2]), object_dir.join("prog.o"));
        assert_eq!(&args[3..], ["false", "0"]);
    }

    #[test]
    fn protocol_parses_pinned_values() {
        assert_eq!("1".parse::<CompilerProtocol>().unwrap(), CompilerProtocol::V1);
        assert_eq!("v2".parse::<CompilerProtocol>().unwrap(), CompilerProtocol::V2);
        assert!("3".parse::<CompilerProtocol>().is_err());
        assert_eq!(CompilerProtocol::default(), CompilerProtocol::V2);
    }

    #[test]
    fn failing_compiler_surfaces_output() {
        let temp = TempDir::new().unwrap();
        let runner = CannedRunner {
            result: ProcessResult {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "prog.spice:1:1 error: unexpected EOF".to_string(),
            },
            calls: RefCell::new(Vec::new()),
        };
        let err = compile(
            &runner,
            Path::new("spicec"),
            &request(&temp, false, 2),
            &target(),
            temp.path(),
            CompilerProtocol::V2,
        )
        .unwrap_err();
        match err {
            SpiceError::Compile { exit_code, output } => {
                assert_eq!(exit_code, Some(1));
                assert!(output.contains("unexpected EOF"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.calls.borrow().len(), 1);
    }
}
