//! Zip extraction with progress reporting.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use levelup_core::UnzipProgress;

use crate::error::InstallError;

/// Outcome of a completed extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSummary {
    /// Files written (directories excluded).
    pub files: usize,
    /// Progress as of the last entry.
    pub progress: UnzipProgress,
}

/// Extract every entry of `archive_path` below `destination`.
///
/// Progress is measured in compressed bytes consumed against the archive's
/// size on disk and reported after each entry. Returning `false` from
/// `on_progress` stops the extraction with [`InstallError::Aborted`].
///
/// Entries whose names would land outside `destination` fail the whole
/// extraction.
pub fn extract_archive<F>(
    archive_path: &Path,
    destination: &Path,
    mut on_progress: F,
) -> Result<ExtractionSummary, InstallError>
where
    F: FnMut(&UnzipProgress) -> bool,
{
    let file = File::open(archive_path).map_err(|e| InstallError::io(archive_path, e))?;
    let total_bytes = file
        .metadata()
        .map_err(|e| InstallError::io(archive_path, e))?
        .len();
    let mut archive = zip::ZipArchive::new(file)?;

    fs::create_dir_all(destination).map_err(|e| InstallError::io(destination, e))?;

    let mut consumed = 0u64;
    let mut files = 0usize;
    let mut progress = UnzipProgress::at(0, total_bytes);

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let out_path: PathBuf = entry
            .enclosed_name()
            .map(|relative| destination.join(relative))
            .ok_or_else(|| InstallError::UnsafeEntry(entry.name().to_string()))?;

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| InstallError::io(&out_path, e))?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
            }
            let mut out = File::create(&out_path).map_err(|e| InstallError::io(&out_path, e))?;
            io::copy(&mut entry, &mut out).map_err(|e| InstallError::io(&out_path, e))?;
            files += 1;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))
                    .map_err(|e| InstallError::io(&out_path, e))?;
            }
        }

        consumed = consumed.saturating_add(entry.compressed_size());
        progress = UnzipProgress::at(consumed.min(total_bytes), total_bytes);
        if !on_progress(&progress) {
            return Err(InstallError::Aborted);
        }
    }

    tracing::debug!(
        target: "levelup.install",
        archive = %archive_path.display(),
        destination = %destination.display(),
        files,
        "archive extracted"
    );

    Ok(ExtractionSummary { files, progress })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use std::path::Path;

    use zip::write::SimpleFileOptions;

    /// Write a zip with the given `(name, content)` entries; names ending in
    /// `/` become directories.
    pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content).unwrap();
            }
        }
        writer.finish().unwrap();
    }
}
