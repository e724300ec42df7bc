use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

/// What to do when the directory holding a document is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParentDir {
    /// Never conjure an install directory; a missing one is an error.
    MustExist,
    /// Launcher-owned locations are created on demand.
    Create,
}

/// Serialise `value` as pretty JSON and swap it in for `path`.
///
/// The document is staged next to the target, synced, and persisted over it,
/// so readers see either the old document or the whole new one. A staged
/// file that never got persisted is removed when it drops.
pub(crate) fn write_json_atomic<T: Serialize>(
    path: &Path,
    value: &T,
    parent: ParentDir,
) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    if parent == ParentDir::Create {
        std::fs::create_dir_all(dir)?;
    }

    let mut staged = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut staged, value)?;
    staged.flush()?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|error| error.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{ParentDir, write_json_atomic};

    fn entry_names(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .expect("dir should be readable")
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn replaces_a_corrupt_manifest_in_place() {
        let install = tempfile::tempdir().expect("tempdir should be created");
        let path = install.path().join("version.json");
        std::fs::write(&path, "{half a manif").expect("seed should be written");

        write_json_atomic(&path, &json!({ "version": "2.0.0" }), ParentDir::MustExist)
            .expect("manifest should be replaced");

        let written: Value = serde_json::from_str(
            &std::fs::read_to_string(&path).expect("manifest should be readable"),
        )
        .expect("manifest should be JSON");
        assert_eq!(written["version"], "2.0.0");
        assert_eq!(entry_names(install.path()), vec!["version.json"]);
    }

    #[test]
    fn missing_install_directory_is_not_created() {
        let root = tempfile::tempdir().expect("tempdir should be created");
        let install = root.path().join("uninstalled");

        let result = write_json_atomic(
            &install.join("version.json"),
            &json!({ "version": "1.0.0" }),
            ParentDir::MustExist,
        );

        assert!(result.is_err());
        assert!(!install.exists());
    }

    #[test]
    fn cache_directories_are_created_on_demand() {
        let root = tempfile::tempdir().expect("tempdir should be created");
        let path = root.path().join("data").join("cache").join("news-cache.json");

        write_json_atomic(&path, &json!({ "news": [] }), ParentDir::Create)
            .expect("cache should be written");

        assert!(path.is_file());
        assert_eq!(entry_names(path.parent().expect("cache has a parent")), vec!["news-cache.json"]);
    }
}
