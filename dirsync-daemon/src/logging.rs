//! Tracing subscriber setup: console plus a persistent, rotatable log file.
//!
//! `log` records from `dirsync-sync` reach the same subscriber through the
//! `tracing-log` bridge installed by `try_init`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

use crate::error::{io_err, DaemonError};
use crate::log_rotation;

/// Line format of the log file. The console is always human-readable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Append-mode log file shared by every writer handed out to tracing.
///
/// Cloning is cheap; all clones write to the same handle, and
/// [`LogFile::rotate_if_needed`] swaps that handle for everyone.
#[derive(Debug, Clone)]
pub struct LogFile {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    file: Mutex<File>,
}

impl LogFile {
    /// Open `path` for appending, creating missing parent directories.
    pub fn open(path: &Path) -> Result<Self, DaemonError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let file = open_append(path).map_err(|e| io_err(path, e))?;
        Ok(Self {
            inner: Arc::new(Inner {
                path: path.to_path_buf(),
                file: Mutex::new(file),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Rotate once the file reaches `max_bytes`, then reopen a fresh file.
    /// Returns whether rotation happened.
    pub fn rotate_if_needed(&self, max_bytes: u64, max_files: usize) -> io::Result<bool> {
        let mut file = self.lock();
        if !log_rotation::needs_rotation(&self.inner.path, max_bytes)? {
            return Ok(false);
        }
        file.flush()?;
        log_rotation::shift_backups(&self.inner.path, max_files)?;
        *file = open_append(&self.inner.path)?;
        Ok(true)
    }

    pub fn flush(&self) -> io::Result<()> {
        self.lock().flush()
    }

    fn lock(&self) -> MutexGuard<'_, File> {
        self.inner.file.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Writer for a single formatted event; holds the file lock while alive.
pub struct LogFileWriter<'a>(MutexGuard<'a, File>);

impl Write for LogFileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogFileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LogFileWriter(self.lock())
    }
}

/// Install the global subscriber: console output plus, when given, the log
/// file. Filter comes from `RUST_LOG`, defaulting to `info`.
///
/// A subscriber that is already installed is left in place.
pub fn init_tracing(log_file: Option<LogFile>, format: LogFormat) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_target(false);

    let (text_file, json_file) = match (log_file, format) {
        (None, _) => (None, None),
        (Some(log), LogFormat::Text) => (
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(log),
            ),
            None,
        ),
        (Some(log), LogFormat::Json) => (
            None,
            Some(fmt::layer().json().with_target(false).with_writer(log)),
        ),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(text_file)
        .with(json_file)
        .try_init();
}
