//! Pass result: counters plus collected per-entry errors.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use dirsync_core::DigestChoice;

use crate::error::EntryError;

/// Per-pass action counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    /// Replica directories created (the replica root included).
    pub created_dirs: usize,
    /// Files copied to a replica path that had no file.
    pub copied: usize,
    /// Files whose replica content differed and was replaced.
    pub updated: usize,
    pub removed_files: usize,
    /// Whole replica subtrees removed, each counted once.
    pub removed_dirs: usize,
    /// Files whose checksums matched.
    pub unchanged: usize,
    /// Source entries not processed: special entries, kind conflicts, failures.
    pub skipped: usize,
}

impl PassStats {
    pub fn created(&self) -> usize {
        self.created_dirs + self.copied
    }

    pub fn removed(&self) -> usize {
        self.removed_files + self.removed_dirs
    }

    /// Number of mutations performed (or planned, in a dry run).
    pub fn total_actions(&self) -> usize {
        self.created() + self.updated + self.removed()
    }
}

/// Outcome of one [`reconcile`](crate::reconcile) pass.
#[derive(Debug)]
pub struct PassReport {
    pub source: PathBuf,
    pub replica: PathBuf,
    pub digest: DigestChoice,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: PassStats,
    pub errors: Vec<EntryError>,
    /// The pass stopped early at a cancellation checkpoint.
    pub cancelled: bool,
    pub dry_run: bool,
}

impl PassReport {
    /// No entry errors and not cancelled: the replica now mirrors the source.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }

    pub fn duration_ms(&self) -> u128 {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
            .as_millis()
    }

    /// Serializable view for JSON output.
    pub fn summary(&self) -> PassSummary {
        PassSummary {
            source: self.source.clone(),
            replica: self.replica.clone(),
            digest: self.digest,
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration_ms: self.duration_ms(),
            stats: self.stats.clone(),
            errors: self
                .errors
                .iter()
                .map(|err| ErrorSummary {
                    path: err.path().to_path_buf(),
                    category: err.category(),
                    message: err.to_string(),
                })
                .collect(),
            cancelled: self.cancelled,
            dry_run: self.dry_run,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub source: PathBuf,
    pub replica: PathBuf,
    pub digest: DigestChoice,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u128,
    pub stats: PassStats,
    pub errors: Vec<ErrorSummary>,
    pub cancelled: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorSummary {
    pub path: PathBuf,
    pub category: &'static str,
    pub message: String,
}
