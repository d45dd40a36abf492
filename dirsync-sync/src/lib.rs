//! # dirsync-sync
//!
//! Checksum-gated one-way tree reconciliation.
//!
//! Call [`reconcile`] to run one pass that makes a replica tree mirror a source
//! tree. Files are compared by [`checksum`] only; sizes and timestamps are
//! never trusted. Per-entry failures are collected into the [`PassReport`] and
//! reported through the injected [`EventSink`]; only a [`PathError`] on the
//! roots fails the pass outright.
//!
//! [`PathError`]: dirsync_core::PathError

pub mod cancel;
pub mod checksum;
pub mod error;
pub mod events;
pub mod reconcile;
pub mod report;

pub use cancel::CancelToken;
pub use checksum::{checksum, CHUNK_SIZE};
pub use error::{EntryError, EntryOp, SyncError};
pub use events::{
    EventSink, FanoutSink, FileChange, Level, LogSink, MemorySink, RemovalReason, SyncEvent,
};
pub use reconcile::{reconcile, Reconciler, SyncOptions};
pub use report::{ErrorSummary, PassReport, PassStats, PassSummary};
