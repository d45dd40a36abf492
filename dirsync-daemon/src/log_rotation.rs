//! Size-based rotation for the sync log file.
//!
//! When the live log reaches [`MAX_LOG_BYTES`] it is renamed to `<name>.1`,
//! older copies shift up by one, and anything beyond [`MAX_ROTATED_FILES`]
//! is dropped:
//!   dirsync.log → dirsync.log.1 → dirsync.log.2 → … → dirsync.log.5

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Live log size that triggers rotation (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Rotated copies kept next to the live log.
pub const MAX_ROTATED_FILES: usize = 5;

/// Whether `log_path` has reached `max_bytes`. A missing file never needs
/// rotation.
pub fn needs_rotation(log_path: &Path, max_bytes: u64) -> io::Result<bool> {
    match fs::metadata(log_path) {
        Ok(meta) => Ok(meta.len() >= max_bytes),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Move `log_path` to `<name>.1`, shifting existing copies and discarding
/// the one that would become `<name>.<max_files + 1>`.
///
/// Does not recreate the live file; the writer reopens it.
pub fn shift_backups(log_path: &Path, max_files: usize) -> io::Result<()> {
    if max_files == 0 {
        return remove_if_present(log_path);
    }
    remove_if_present(&numbered_path(log_path, max_files))?;
    for n in (1..max_files).rev() {
        let from = numbered_path(log_path, n);
        if from.exists() {
            fs::rename(&from, numbered_path(log_path, n + 1))?;
        }
    }
    fs::rename(log_path, numbered_path(log_path, 1))
}

/// `dirsync.log` + 2 → `dirsync.log.2`.
pub fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let mut name = base.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{n}"));
    base.with_file_name(name)
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
