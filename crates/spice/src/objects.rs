//! Object file discovery in a build's working directory

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::diagnostics::{Result, SpiceError};

/// Extensions the compiler may emit object code with
const OBJECT_EXTENSIONS: [&str; 2] = ["o", "obj"];

/// Recursively collect every object file below `root`.
///
/// Entries are visited in file-name order within each directory, so the
/// result is stable between runs. On Windows separators are normalized to
/// `/`; elsewhere `\` is an ordinary file name character and kept.
/// A missing root, or any I/O error while walking, is a `Scan` error.
pub fn find_object_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut object_files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_path_buf();
            SpiceError::Scan {
                path,
                source: err.into(),
            }
        })?;
        if !entry.file_type().is_file() || !is_object_file(entry.path()) {
            continue;
        }
        object_files.push(normalize_separators(entry.path()));
    }
    Ok(object_files)
}

fn normalize_separators(path: &Path) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(path.to_string_lossy().replace('\\', "/"))
    } else {
        path.to_path_buf()
    }
}

fn is_object_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| OBJECT_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn finds_nested_objects_and_skips_others() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("nested")).unwrap();
        for file in ["a.o", "b.o", "nested/c.o", "notes.txt", "a.o.d", "nested/main.spice"] {
            fs::write(root.join(file), b"").unwrap();
        }
        // A directory that merely looks like an object file
        fs::create_dir(root.join("fake.o")).unwrap();

        let found: HashSet<PathBuf> = find_object_files(root).unwrap().into_iter().collect();
        let expected: HashSet<PathBuf> = ["a.o", "b.o", "nested/c.o"]
            .iter()
            .map(|f| normalize_separators(&root.join(f)))
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn order_is_stable() {
        let temp = TempDir::new().unwrap();
        for file in ["z.o", "m.o", "a.o"] {
            fs::write(temp.path().join(file), b"").unwrap();
        }
        let first = find_object_files(temp.path()).unwrap();
        let second = find_object_files(temp.path()).unwrap();
        assert_eq!(first, second);
        assert!(first[0].ends_with("a.o"));
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let temp = TempDir::new().unwrap();
        assert!(find_object_files(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_root_is_a_scan_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("does-not-exist");
        assert!(matches!(
            find_object_files(&missing),
            Err(SpiceError::Scan { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn backslash_in_file_name_is_preserved() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("we\\ird.o"), b"").unwrap();
        let found = find_object_files(temp.path()).unwrap();
        assert_eq!(found, vec![temp.path().join("we\\ird.o")]);
        assert!(found[0].exists());
    }
}
