//! Error types for dirsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal problems with the source or replica roots.
///
/// Checked once per pass, before any mutation. A pass never starts while one
/// of these holds.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("source directory does not exist: {path}")]
    SourceMissing { path: PathBuf },

    #[error("source path is not a directory: {path}")]
    SourceNotDirectory { path: PathBuf },

    #[error("replica path exists but is not a directory: {path}")]
    ReplicaNotDirectory { path: PathBuf },

    /// The replica's parent directory does not exist, so the replica root
    /// cannot be created.
    #[error("replica parent directory is not reachable: {path}")]
    ReplicaParentMissing { path: PathBuf },

    #[error("source and replica must be different paths: {path}")]
    SamePath { path: PathBuf },

    /// One root lies inside the other.
    #[error("source {source_root} and replica {replica_root} must not be nested")]
    NestedRoots {
        source_root: PathBuf,
        replica_root: PathBuf,
    },

    #[error("I/O error resolving {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// All errors that can arise while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error: includes the file path and serde_yaml's line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config file not found at {path}")]
    NotFound { path: PathBuf },

    #[error("interval must be a positive number of seconds, got {0}")]
    InvalidInterval(f64),

    #[error("missing required setting '{0}'")]
    Missing(&'static str),

    #[error("unknown hash function '{0}'; expected: md5, sha256")]
    UnknownDigest(String),

    #[error(transparent)]
    Path(#[from] PathError),

    /// `dirs::home_dir()` returned `None`: cannot derive the default log path.
    #[error("cannot determine home directory; set $HOME or pass a log path")]
    HomeNotFound,
}
