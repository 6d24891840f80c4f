//! Filesystem primitives used by install steps.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use sha2::{Digest, Sha256};

use crate::error::InstallError;

const HASH_CHUNK_BYTES: usize = 1024 * 1024;

/// Lowercase hex SHA-256 of a file, read in 1 MiB chunks.
pub fn sha256_file(path: &Path) -> Result<String, InstallError> {
    let mut file = File::open(path).map_err(|e| InstallError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_BYTES];
    loop {
        let n = file.read(&mut buffer).map_err(|e| InstallError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Move a file, creating the destination's parents and replacing any file
/// already there.
///
/// Falls back to copy-and-delete across volumes; permissions and the
/// modification time of the source are carried over either way.
pub fn move_file(from: &Path, to: &Path) -> Result<(), InstallError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
    }
    let metadata = fs::metadata(from).map_err(|e| InstallError::io(from, e))?;

    match fs::rename(from, to) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to).map_err(|e| InstallError::io(to, e))?;
            fs::remove_file(from).map_err(|e| InstallError::io(from, e))?;
        }
        Err(err) => return Err(InstallError::io(to, err)),
    }

    fs::set_permissions(to, metadata.permissions()).map_err(|e| InstallError::io(to, e))?;
    filetime::set_file_mtime(to, FileTime::from_last_modification_time(&metadata))
        .map_err(|e| InstallError::io(to, e))?;
    Ok(())
}

/// Remove a file or a directory tree.
///
/// Returns `Ok(false)` when nothing existed at `path`.
pub fn remove_path(path: &Path) -> Result<bool, InstallError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(InstallError::io(path, err)),
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| InstallError::io(path, e))?;
    Ok(true)
}

/// Remove staged artifacts, logging instead of failing.
pub fn remove_staged(paths: &[PathBuf]) {
    for path in paths {
        match remove_path(path) {
            Ok(true) => {
                tracing::debug!(target: "levelup.install", path = %path.display(), "removed staged artifact");
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(target: "levelup.install", path = %path.display(), error = %err, "failed to remove staged artifact");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_sha256_of_known_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_move_file_creates_parents_and_keeps_mtime() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("src.bin");
        fs::write(&from, b"payload").unwrap();
        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        filetime::set_file_mtime(&from, FileTime::from_system_time(stamp)).unwrap();

        let to = dir.path().join("a/b/dst.bin");
        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"payload");
        let mtime = FileTime::from_last_modification_time(&fs::metadata(&to).unwrap());
        assert_eq!(mtime.unix_seconds(), 1_600_000_000);
    }

    #[test]
    fn test_move_file_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("new");
        let to = dir.path().join("old");
        fs::write(&from, b"new").unwrap();
        fs::write(&to, b"old").unwrap();
        move_file(&from, &to).unwrap();
        assert_eq!(fs::read(&to).unwrap(), b"new");
    }

    #[test]
    fn test_remove_path_handles_missing_files_and_dirs() {
        let dir = TempDir::new().unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("nested")).unwrap();
        fs::write(tree.join("nested/file"), b"x").unwrap();

        assert!(remove_path(&tree).unwrap());
        assert!(!tree.exists());
        assert!(!remove_path(&tree).unwrap());
    }
}
