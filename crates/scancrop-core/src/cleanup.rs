//! Emptying intermediate directories between runs

use crate::error::ScanCropError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// What a cleanup pass removed and what it could not
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: usize,
    pub failed: Vec<(PathBuf, io::Error)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete everything below `dir`, keeping `dir` itself (created if absent)
///
/// Entries are removed deepest first. A failure on one entry is logged and recorded, and the
/// remaining entries are still attempted.
pub fn clean_directory(dir: &Path) -> Result<CleanupReport, ScanCropError> {
    clean_with(dir, remove_entry)
}

fn remove_entry(path: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
}

fn clean_with<F>(dir: &Path, mut remove: F) -> Result<CleanupReport, ScanCropError>
where
    F: FnMut(&Path, bool) -> io::Result<()>,
{
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| ScanCropError::io(dir, e))?;
        debug!(dir = %dir.display(), "Created directory");
        return Ok(CleanupReport::default());
    }
    if !dir.is_dir() {
        return Err(ScanCropError::io(
            dir,
            io::Error::new(io::ErrorKind::Other, "not a directory"),
        ));
    }

    let mut report = CleanupReport::default();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .contents_first(true)
        .follow_links(false)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(dir).to_path_buf();
                warn!(path = %path.display(), error = %err, "Failed to read entry");
                report.failed.push((path, io::Error::new(io::ErrorKind::Other, err)));
                continue;
            }
        };

        let path = entry.path();
        match remove(path, entry.file_type().is_dir()) {
            Ok(()) => report.removed += 1,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to delete");
                report.failed.push((path.to_path_buf(), err));
            }
        }
    }

    debug!(
        dir = %dir.display(),
        removed = report.removed,
        failed = report.failed.len(),
        "Directory cleaned"
    );
    Ok(report)
}
