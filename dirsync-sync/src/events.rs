//! Structured pass events and the sinks that receive them.
//!
//! The reconciler never logs through a global; it is handed an [`EventSink`]
//! by its caller. [`LogSink`] forwards to the `log` facade, [`MemorySink`]
//! captures events for inspection, [`FanoutSink`] duplicates to several sinks.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use dirsync_core::{DigestChoice, EntryKind};

use crate::report::PassStats;

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Error,
}

/// Whether a copied file was new to the replica or replaced different content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChange {
    Created,
    Updated,
}

/// Why a replica entry was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemovalReason {
    /// The source directory has no entry with this name.
    MissingFromSource { source: PathBuf },
    /// The source entry has a different kind and replacement is enabled.
    KindChanged {
        source_kind: EntryKind,
        replica_kind: EntryKind,
    },
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalReason::MissingFromSource { source } => {
                let name = source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let parent = source
                    .parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                write!(f, "There is no {name} in the source {parent}")
            }
            RemovalReason::KindChanged {
                source_kind,
                replica_kind,
            } => write!(
                f,
                "Replica {replica_kind} replaced by source {source_kind}"
            ),
        }
    }
}

/// One log-worthy occurrence during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    PassStarted {
        source: PathBuf,
        replica: PathBuf,
        digest: DigestChoice,
        dry_run: bool,
    },
    DirectoryCreated {
        path: PathBuf,
        dry_run: bool,
    },
    FileCopied {
        source: PathBuf,
        replica: PathBuf,
        change: FileChange,
        dry_run: bool,
    },
    DirectoryRemoved {
        path: PathBuf,
        reason: RemovalReason,
        dry_run: bool,
    },
    FileRemoved {
        path: PathBuf,
        reason: RemovalReason,
        dry_run: bool,
    },
    /// Permission, I/O, or kind-conflict failure on a single entry.
    EntryFailed {
        path: PathBuf,
        category: String,
        message: String,
    },
    PassCompleted {
        stats: PassStats,
        errors: usize,
        cancelled: bool,
        duration_ms: u128,
    },
}

impl SyncEvent {
    pub fn level(&self) -> Level {
        match self {
            SyncEvent::EntryFailed { .. } => Level::Error,
            _ => Level::Info,
        }
    }

    fn dry_run(&self) -> bool {
        match self {
            SyncEvent::PassStarted { dry_run, .. }
            | SyncEvent::DirectoryCreated { dry_run, .. }
            | SyncEvent::FileCopied { dry_run, .. }
            | SyncEvent::DirectoryRemoved { dry_run, .. }
            | SyncEvent::FileRemoved { dry_run, .. } => *dry_run,
            SyncEvent::EntryFailed { .. } | SyncEvent::PassCompleted { .. } => false,
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run() {
            f.write_str("[dry-run] ")?;
        }
        match self {
            SyncEvent::PassStarted {
                source,
                replica,
                digest,
                ..
            } => write!(
                f,
                "Starting folder synchronization: {} -> {} ({digest})",
                source.display(),
                replica.display()
            ),
            SyncEvent::DirectoryCreated { path, .. } => {
                write!(f, "Created directory: {}", path.display())
            }
            SyncEvent::FileCopied {
                replica, change, ..
            } => match change {
                FileChange::Created => write!(f, "Copied file: {}", replica.display()),
                FileChange::Updated => write!(f, "Updated file: {}", replica.display()),
            },
            SyncEvent::DirectoryRemoved { path, reason, .. } => {
                write!(f, "Removed directory: {}. {reason}", path.display())
            }
            SyncEvent::FileRemoved { path, reason, .. } => {
                write!(f, "Removed file: {}. {reason}", path.display())
            }
            SyncEvent::EntryFailed { message, .. } => f.write_str(message),
            SyncEvent::PassCompleted {
                stats,
                errors,
                cancelled,
                duration_ms,
            } => {
                let verb = if *cancelled { "cancelled" } else { "completed" };
                write!(
                    f,
                    "Synchronization {verb} in {duration_ms} ms: {} created, {} updated, {} removed, {} unchanged, {} skipped, {errors} error(s)",
                    stats.created(),
                    stats.updated,
                    stats.removed(),
                    stats.unchanged,
                    stats.skipped,
                )
            }
        }
    }
}

/// Receiver of pass events. Implementations must tolerate calls from the
/// blocking worker that runs the pass.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SyncEvent);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: &SyncEvent) {
        (**self).emit(event)
    }
}

/// Forwards events to the `log` facade at their level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &SyncEvent) {
        match event.level() {
            Level::Info => tracing::info!("{event}"),
            Level::Error => tracing::error!("{event}"),
        }
    }
}

/// Captures every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SyncEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events received so far.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain captured events.
    pub fn take(&self) -> Vec<SyncEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &SyncEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Duplicates each event to every inner sink, in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &SyncEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
