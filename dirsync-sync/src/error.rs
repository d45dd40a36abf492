//! Error types for dirsync-sync.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

use dirsync_core::{EntryKind, PathError};

/// Errors that fail a whole pass or a standalone checksum call.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid roots. Raised before any mutation.
    #[error(transparent)]
    Path(#[from] PathError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Filesystem operation that was being attempted on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOp {
    List,
    CreateDir,
    Checksum,
    Copy,
    RemoveFile,
    RemoveDir,
}

impl fmt::Display for EntryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            EntryOp::List => "listing directory",
            EntryOp::CreateDir => "creating directory",
            EntryOp::Checksum => "computing checksum",
            EntryOp::Copy => "copying file",
            EntryOp::RemoveFile => "removing file",
            EntryOp::RemoveDir => "removing directory",
        };
        f.write_str(op)
    }
}

/// A failure isolated to one entry. Collected, never raised.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("permission denied at {path} while {op}: {source}")]
    Permission {
        path: PathBuf,
        op: EntryOp,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {path} while {op}: {source}")]
    Io {
        path: PathBuf,
        op: EntryOp,
        #[source]
        source: std::io::Error,
    },

    #[error("entry kind conflict at {path}: source is a {source_kind}, replica is a {replica_kind}")]
    KindConflict {
        path: PathBuf,
        source_kind: EntryKind,
        replica_kind: EntryKind,
    },
}

impl EntryError {
    /// Classify an I/O failure; `PermissionDenied` becomes [`EntryError::Permission`].
    pub fn from_io(path: impl Into<PathBuf>, op: EntryOp, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == ErrorKind::PermissionDenied {
            EntryError::Permission { path, op, source }
        } else {
            EntryError::Io { path, op, source }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            EntryError::Permission { path, .. }
            | EntryError::Io { path, .. }
            | EntryError::KindConflict { path, .. } => path,
        }
    }

    /// Short category label used in summaries.
    pub fn category(&self) -> &'static str {
        match self {
            EntryError::Permission { .. } => "permission",
            EntryError::Io { .. } => "io",
            EntryError::KindConflict { .. } => "kind-conflict",
        }
    }
}
