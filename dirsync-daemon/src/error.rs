use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the scheduler runtime and its log file.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] dirsync_core::ConfigError),

    #[error("invalid sync roots: {0}")]
    Path(#[from] dirsync_core::PathError),

    #[error("sync error: {0}")]
    Sync(#[from] dirsync_sync::SyncError),

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
