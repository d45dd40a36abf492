//! Domain types shared by the reconciler, the scheduler and the CLI.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::fs::FileType;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Digest used as the content-equality test between a source file and its
/// replica copy. Fixed for the lifetime of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DigestChoice {
    /// 128-bit MD5. Fast, not collision resistant.
    Md5,
    /// 256-bit SHA-256.
    #[default]
    Sha256,
}

impl DigestChoice {
    pub fn all() -> &'static [DigestChoice] {
        &[DigestChoice::Md5, DigestChoice::Sha256]
    }

    /// Length of the hex-encoded digest string.
    pub fn hex_len(self) -> usize {
        match self {
            DigestChoice::Md5 => 32,
            DigestChoice::Sha256 => 64,
        }
    }
}

impl fmt::Display for DigestChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestChoice::Md5 => write!(f, "md5"),
            DigestChoice::Sha256 => write!(f, "sha256"),
        }
    }
}

impl FromStr for DigestChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(DigestChoice::Md5),
            "sha256" | "sha-256" => Ok(DigestChoice::Sha256),
            other => Err(ConfigError::UnknownDigest(other.to_string())),
        }
    }
}

/// Kind of a directory entry as seen without following symbolic links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    /// Symbolic links, sockets, FIFOs, devices.
    Other,
}

impl EntryKind {
    pub fn from_file_type(ty: FileType) -> Self {
        if ty.is_dir() {
            EntryKind::Directory
        } else if ty.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Directory => write!(f, "directory"),
            EntryKind::Other => write!(f, "special entry"),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settings for a periodic synchronization job.
///
/// Deserializable from YAML; every field except the two roots has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub source: PathBuf,
    pub replica: PathBuf,
    /// Seconds to sleep between completed passes. Fractions are allowed.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,
    /// Log file or directory. `None` means the default under the home dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<PathBuf>,
    #[serde(default)]
    pub digest: DigestChoice,
    /// Replace replica entries whose kind differs from the source instead of
    /// reporting them as errors.
    #[serde(default)]
    pub replace_kind_conflicts: bool,
}

pub const DEFAULT_INTERVAL_SECS: f64 = 60.0;

fn default_interval_secs() -> f64 {
    DEFAULT_INTERVAL_SECS
}

impl SyncConfig {
    pub fn new(source: impl Into<PathBuf>, replica: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            replica: replica.into(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            log: None,
            digest: DigestChoice::default(),
            replace_kind_conflicts: false,
        }
    }

    /// Interval as a [`Duration`]. Only meaningful after [`SyncConfig::validate`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }

    /// Cheap checks that need no filesystem access: positive finite interval
    /// and distinct root paths.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.interval_secs.is_finite() || self.interval_secs <= 0.0 {
            return Err(ConfigError::InvalidInterval(self.interval_secs));
        }
        if self.source == self.replica {
            return Err(crate::error::PathError::SamePath {
                path: self.source.clone(),
            }
            .into());
        }
        Ok(())
    }
}
