//! Utility items shared between deployer crates.

use std::path::{Path, PathBuf};

pub mod fs_locking;
pub mod restricted;

pub use restricted::validate_name;

/// The file name of the deployer manifest.
pub const MANIFEST_FILE_NAME: &str = "Deployer.toml";

/// Registry directory used when the manifest does not name one.
pub const DEFAULT_REGISTRY_DIRECTORY: &str = "deployments";

/// Continually go up in the file tree until a specified file is found.
pub fn find_parent_dir_with_file(starter_path: &Path, file_name: &str) -> Option<PathBuf> {
    let mut path = std::fs::canonicalize(starter_path).ok()?;
    loop {
        if path.join(file_name).is_file() {
            return Some(path);
        }
        if !path.pop() {
            return None;
        }
    }
}

/// Continually go up in the file tree until a deployer manifest file is found.
pub fn find_manifest_dir(starter_path: &Path) -> Option<PathBuf> {
    find_parent_dir_with_file(starter_path, MANIFEST_FILE_NAME)
}

pub fn default_registry_directory(manifest_dir: &Path) -> PathBuf {
    manifest_dir.join(DEFAULT_REGISTRY_DIRECTORY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_is_found_from_nested_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(MANIFEST_FILE_NAME), "").unwrap();
        let nested = root.path().join("tasks").join("settling");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_manifest_dir(&nested).unwrap();
        assert_eq!(found, std::fs::canonicalize(root.path()).unwrap());
    }

    #[test]
    fn missing_manifest() {
        let root = tempfile::tempdir().unwrap();
        let found = find_parent_dir_with_file(root.path(), "Deployer.does-not-exist.toml");
        assert!(found.is_none());
    }
}
