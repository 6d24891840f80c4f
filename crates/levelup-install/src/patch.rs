//! Incremental patch application.
//!
//! An incremental archive is extracted into the patch workspace; its diff
//! manifest then drives two passes over the install directory: delete the
//! `removed` paths, and move every `added` file from the patch content
//! directory into place, verifying its SHA-256.

use std::fs;
use std::path::Path;

use levelup_core::DiffManifest;

use crate::error::InstallError;
use crate::fs::{move_file, remove_path, sha256_file};

/// A listed path the pass could not process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

impl FileFailure {
    fn new(path: &str, error: &InstallError) -> Self {
        Self {
            path: path.to_string(),
            error: error.to_string(),
        }
    }
}

/// Result of the removal pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub removed: Vec<String>,
    /// Paths listed for removal that were already absent.
    pub missing: Vec<String>,
    pub failed: Vec<FileFailure>,
}

/// A file whose content does not match the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashMismatch {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

/// Result of the addition pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionReport {
    pub added: Vec<String>,
    pub hash_mismatches: Vec<HashMismatch>,
    /// Files that could not be moved into place or read back.
    pub failed: Vec<FileFailure>,
}

/// Read and validate the diff manifest extracted from an incremental archive.
pub fn read_manifest(path: &Path) -> Result<DiffManifest, InstallError> {
    let bytes = fs::read(path).map_err(|e| InstallError::io(path, e))?;
    Ok(DiffManifest::from_json(&bytes)?)
}

/// Delete every `removed` path below `install_root`.
///
/// Absent paths and paths that cannot be deleted are reported and logged;
/// the pass always visits the whole list.
pub fn remove_files(install_root: &Path, manifest: &DiffManifest) -> RemovalReport {
    let mut report = RemovalReport::default();
    for relative in &manifest.removed {
        let target = install_root.join(relative);
        match remove_path(&target) {
            Ok(true) => report.removed.push(relative.clone()),
            Ok(false) => {
                tracing::warn!(target: "levelup.install", path = %target.display(), "file listed for removal not found");
                report.missing.push(relative.clone());
            }
            Err(err) => {
                tracing::warn!(target: "levelup.install", path = %target.display(), error = %err, "could not remove file");
                report.failed.push(FileFailure::new(relative, &err));
            }
        }
    }
    report
}

/// Move every `added` file from `content_dir` into `install_root` and check
/// its hash.
///
/// A file that cannot be moved is logged and skipped without hashing. A hash
/// mismatch is reported and logged; the file stays in place.
pub fn add_files(
    content_dir: &Path,
    install_root: &Path,
    manifest: &DiffManifest,
) -> AdditionReport {
    let mut report = AdditionReport::default();
    for (relative, expected) in &manifest.added {
        let source = content_dir.join(relative);
        let destination = install_root.join(relative);
        if let Err(err) = move_file(&source, &destination) {
            tracing::warn!(target: "levelup.install", path = %relative, error = %err, "could not move patched file");
            report.failed.push(FileFailure::new(relative, &err));
            continue;
        }

        let actual = match sha256_file(&destination) {
            Ok(actual) => actual,
            Err(err) => {
                tracing::warn!(target: "levelup.install", path = %relative, error = %err, "could not hash patched file");
                report.failed.push(FileFailure::new(relative, &err));
                continue;
            }
        };
        if actual.eq_ignore_ascii_case(expected) {
            tracing::trace!(target: "levelup.install", path = %relative, "hash verified");
        } else {
            tracing::error!(
                target: "levelup.install",
                path = %destination.display(),
                %expected,
                %actual,
                "file hash does not match manifest"
            );
            report.hash_mismatches.push(HashMismatch {
                path: relative.clone(),
                expected: expected.clone(),
                actual,
            });
        }
        report.added.push(relative.clone());
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use tempfile::TempDir;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    fn manifest(added: &[(&str, &str)], removed: &[&str]) -> DiffManifest {
        DiffManifest {
            added: added
                .iter()
                .map(|(p, h)| ((*p).to_string(), (*h).to_string()))
                .collect::<BTreeMap<_, _>>(),
            removed: removed
                .iter()
                .map(|p| (*p).to_string())
                .collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn test_remove_reports_missing_paths() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("old.dat"), b"x").unwrap();

        let report = remove_files(dir.path(), &manifest(&[], &["old.dat", "gone.dat"]));
        assert_eq!(report.removed, vec!["old.dat".to_string()]);
        assert_eq!(report.missing, vec!["gone.dat".to_string()]);
        assert!(!dir.path().join("old.dat").exists());
    }

    #[test]
    fn test_add_moves_files_and_verifies_hashes() {
        let dir = TempDir::new().unwrap();
        let content = dir.path().join("content");
        let root = dir.path().join("game");
        fs::create_dir_all(content.join("sub")).unwrap();
        fs::write(content.join("sub/a.txt"), b"abc").unwrap();
        fs::write(content.join("b.txt"), b"not abc").unwrap();
        let upper = ABC_SHA256.to_uppercase();

        let report = add_files(
            &content,
            &root,
            &manifest(
                &[("sub/a.txt", upper.as_str()), ("b.txt", ABC_SHA256)],
                &[],
            ),
        );

        assert_eq!(report.added.len(), 2);
        assert_eq!(report.hash_mismatches.len(), 1);
        assert_eq!(report.hash_mismatches[0].path, "b.txt");
        assert_eq!(fs::read(root.join("sub/a.txt")).unwrap(), b"abc");
        assert!(root.join("b.txt").exists());
        assert!(!content.join("sub/a.txt").exists());
    }

    #[test]
    fn test_add_skips_missing_payload_and_continues() {
        let dir = TempDir::new().unwrap();
        let content = dir.path().join("content");
        let root = dir.path().join("game");
        fs::create_dir_all(&content).unwrap();
        fs::write(content.join("present.txt"), b"abc").unwrap();

        let report = add_files(
            &content,
            &root,
            &manifest(&[("missing.bin", ABC_SHA256), ("present.txt", ABC_SHA256)], &[]),
        );

        assert_eq!(report.added, vec!["present.txt".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, "missing.bin");
        assert!(report.hash_mismatches.is_empty());
        assert_eq!(fs::read(root.join("present.txt")).unwrap(), b"abc");
        assert!(!root.join("missing.bin").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_records_failures_and_continues() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("keep.dat"), b"x").unwrap();
        fs::write(dir.path().join("old.dat"), b"x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        let report = remove_files(dir.path(), &manifest(&[], &["locked/keep.dat", "old.dat"]));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        // Root ignores directory permissions, in which case the removal succeeds.
        if locked.join("keep.dat").exists() {
            assert_eq!(report.failed.len(), 1);
            assert_eq!(report.failed[0].path, "locked/keep.dat");
        } else {
            assert!(report.failed.is_empty());
        }
        assert!(report.removed.contains(&"old.dat".to_string()));
        assert!(!dir.path().join("old.dat").exists());
    }

    #[test]
    fn test_read_manifest_validates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.json");
        fs::write(&path, br#"{"added":{"../x":"ab"},"removed":[]}"#).unwrap();
        assert!(matches!(
            read_manifest(&path).unwrap_err(),
            InstallError::Manifest(_)
        ));
        fs::write(&path, br#"{"added":{"x":"ab"},"removed":{"y":"cd"}}"#).unwrap();
        let parsed = read_manifest(&path).unwrap();
        assert!(parsed.removed.contains("y"));
    }
}
