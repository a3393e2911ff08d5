//! Atomic file operations for the archive.
//!
//! Every archive and state file is replaced, never edited:
//! write to a sibling temp file, sync it to disk, then rename it over the
//! target. A failed write removes the temp file again.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Sibling temp path used while writing `path`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to `<path>.tmp`
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Renames the temp file onto the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns a storage error naming the failed step.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let temp = temp_path(path);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::storage("create directory", parent, e))?;
    }

    let file = File::create(&temp).map_err(|e| Error::storage("create", &temp, e))?;
    write_and_sync(file, &temp, content)
        .and_then(|()| fs::rename(&temp, path).map_err(|e| Error::storage("rename", path, e)))
        .inspect_err(|_| {
            let _ = fs::remove_file(&temp);
        })
}

fn write_and_sync(file: File, temp: &Path, content: &[u8]) -> Result<()> {
    let mut writer = BufWriter::new(file);
    writer
        .write_all(content)
        .and_then(|()| writer.flush())
        .map_err(|e| Error::storage("write", temp, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| Error::storage("sync", temp, e))
}
