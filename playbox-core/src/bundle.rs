use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::archive::Archive;
use crate::error::CoreError;

const ARCHIVE_SUFFIX: &str = ".a.js";

/// Loads every `*.a.js` archive under `root`.
///
/// The path relative to `root`, minus the suffix, is the import path the
/// archive must declare (`root/net/http.a.js` holds `net/http`). Archives are
/// returned in sorted path order.
pub fn load_bundle(root: impl AsRef<Path>) -> Result<Vec<Archive>, CoreError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(CoreError::MissingBundle(root.to_path_buf()));
    }

    let mut archives = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        let Some(import_path) = import_path_of(root, path) else {
            continue;
        };
        let bytes = fs::read(path)?;
        archives.push(Archive::read(&import_path, &bytes)?);
    }
    Ok(archives)
}

fn import_path_of(root: &Path, path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    let joined = segments.join("/");
    joined.strip_suffix(ARCHIVE_SUFFIX).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_archive(root: &Path, import_path: &str) {
        let path = root.join(format!("{import_path}{ARCHIVE_SUFFIX}"));
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        let json = Archive::new(import_path, "// bundled")
            .to_json()
            .expect("serialize");
        fs::write(path, json).expect("write archive");
    }

    #[test]
    fn loads_nested_archives_with_import_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_archive(dir.path(), "fmt");
        write_archive(dir.path(), "net/http");
        fs::write(dir.path().join("README.md"), "not an archive").expect("write readme");

        let archives = load_bundle(dir.path()).expect("bundle should load");
        let paths: Vec<_> = archives.iter().map(|a| a.import_path.as_str()).collect();
        assert_eq!(paths, ["fmt", "net/http"]);
    }

    #[test]
    fn rejects_archive_stored_under_wrong_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json = Archive::new("strings", "").to_json().expect("serialize");
        fs::write(dir.path().join("fmt.a.js"), json).expect("write");
        let err = load_bundle(dir.path()).unwrap_err();
        assert!(matches!(err, CoreError::Archive(_)));
    }

    #[test]
    fn reports_missing_bundle_root() {
        let err = load_bundle("./path/that/does/not/exist").unwrap_err();
        assert!(matches!(err, CoreError::MissingBundle(_)));
    }
}
