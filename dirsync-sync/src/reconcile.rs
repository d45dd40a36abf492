//! Recursive source → replica reconciliation.
//!
//! ## Per-directory protocol
//!
//! 1. Create the replica directory if it is absent (ancestors included).
//! 2. List the direct children of both directories.
//! 3. For each source child:
//!    - directory → recurse (the recursive call creates the replica side);
//!    - file → copy if the replica has no file there, otherwise compare fresh
//!      checksums of both copies and copy only when they differ;
//!    - anything else (symlink, FIFO, …) → skipped.
//! 4. For each replica child whose name is absent from the source: remove the
//!    file, or the whole directory subtree in one call.
//!
//! A child whose kind differs between the two sides is an
//! [`EntryError::KindConflict`] unless [`SyncOptions::replace_kind_conflicts`]
//! is set, in which case the replica entry is removed and recreated.
//!
//! Every failure is isolated to its entry: it is logged, collected into the
//! [`PassReport`], and the pass continues with the siblings.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::Path;

use chrono::Utc;
use filetime::FileTime;

use dirsync_core::{validate_roots, DigestChoice, EntryKind, SyncConfig};

use crate::cancel::CancelToken;
use crate::checksum::digest_file;
use crate::error::{EntryError, EntryOp, SyncError};
use crate::events::{EventSink, FileChange, RemovalReason, SyncEvent};
use crate::report::{PassReport, PassStats};

/// Name prefix of the uniquely named file a copy is staged in, inside the
/// target directory, before the final rename.
pub const TMP_PREFIX: &str = ".dirsync-";

/// Name suffix of a staged copy.
pub const TMP_SUFFIX: &str = ".tmp";

/// Knobs for a single pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    pub digest: DigestChoice,
    /// Decide and report every action without touching the replica.
    pub dry_run: bool,
    /// Replace replica entries whose kind differs from the source.
    pub replace_kind_conflicts: bool,
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            digest: config.digest,
            dry_run: false,
            replace_kind_conflicts: config.replace_kind_conflicts,
        }
    }
}

/// Run one pass making `replica` mirror `source` with default options.
///
/// Callers must not run two passes against the same pair concurrently, and
/// nothing else may write to the replica while a pass runs; neither is
/// enforced here.
pub fn reconcile(
    source: &Path,
    replica: &Path,
    digest: DigestChoice,
    sink: &dyn EventSink,
) -> Result<PassReport, SyncError> {
    let options = SyncOptions {
        digest,
        ..SyncOptions::default()
    };
    Reconciler::new(options, sink).run(source, replica)
}

/// Configured single-pass reconciler. Holds no state between passes.
pub struct Reconciler<'a> {
    options: SyncOptions,
    sink: &'a dyn EventSink,
    cancel: CancelToken,
}

impl<'a> Reconciler<'a> {
    pub fn new(options: SyncOptions, sink: &'a dyn EventSink) -> Self {
        Self {
            options,
            sink,
            cancel: CancelToken::new(),
        }
    }

    /// Check `token` before each entry and stop early once it is cancelled.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Validate the roots, then reconcile the whole tree.
    ///
    /// Only a [`SyncError::Path`] fails the call; it is raised before any
    /// mutation. Entry-level failures end up in [`PassReport::errors`].
    pub fn run(&self, source: &Path, replica: &Path) -> Result<PassReport, SyncError> {
        validate_roots(source, replica)?;

        let started_at = Utc::now();
        self.sink.emit(&SyncEvent::PassStarted {
            source: source.to_path_buf(),
            replica: replica.to_path_buf(),
            digest: self.options.digest,
            dry_run: self.options.dry_run,
        });

        let mut pass = Pass {
            options: &self.options,
            sink: self.sink,
            cancel: &self.cancel,
            stats: PassStats::default(),
            errors: Vec::new(),
            cancelled: false,
        };
        let replica_exists = fs::metadata(replica).is_ok();
        pass.sync_dir(source, replica, replica_exists);

        let report = PassReport {
            source: source.to_path_buf(),
            replica: replica.to_path_buf(),
            digest: self.options.digest,
            started_at,
            finished_at: Utc::now(),
            stats: pass.stats,
            errors: pass.errors,
            cancelled: pass.cancelled,
            dry_run: self.options.dry_run,
        };
        self.sink.emit(&SyncEvent::PassCompleted {
            stats: report.stats.clone(),
            errors: report.errors.len(),
            cancelled: report.cancelled,
            duration_ms: report.duration_ms(),
        });
        Ok(report)
    }
}

type Listing = BTreeMap<OsString, EntryKind>;

/// Mutable state of one pass in flight.
struct Pass<'p> {
    options: &'p SyncOptions,
    sink: &'p dyn EventSink,
    cancel: &'p CancelToken,
    stats: PassStats,
    errors: Vec<EntryError>,
    cancelled: bool,
}

impl Pass<'_> {
    fn sync_dir(&mut self, source: &Path, replica: &Path, replica_exists: bool) {
        if self.should_stop() {
            return;
        }
        if !replica_exists && !self.create_dir(replica) {
            return;
        }

        let Some(source_entries) = self.list(source) else {
            return;
        };
        // A directory created this pass (or planned, in a dry run) is empty.
        let replica_entries = if replica_exists {
            match self.list(replica) {
                Some(entries) => entries,
                None => return,
            }
        } else {
            Listing::new()
        };

        for (name, source_kind) in &source_entries {
            if self.should_stop() {
                return;
            }
            let source_path = source.join(name);
            let replica_path = replica.join(name);
            let replica_kind = replica_entries.get(name).copied();

            match (*source_kind, replica_kind) {
                (EntryKind::Directory, None) => self.sync_dir(&source_path, &replica_path, false),
                (EntryKind::Directory, Some(EntryKind::Directory)) => {
                    self.sync_dir(&source_path, &replica_path, true)
                }
                (EntryKind::File, None) => {
                    self.copy_file(&source_path, &replica_path, FileChange::Created)
                }
                (EntryKind::File, Some(EntryKind::File)) => {
                    self.update_file(&source_path, &replica_path)
                }
                (EntryKind::Directory, Some(other)) => {
                    if self.resolve_conflict(&replica_path, EntryKind::Directory, other) {
                        self.sync_dir(&source_path, &replica_path, false);
                    }
                }
                (EntryKind::File, Some(other)) => {
                    if self.resolve_conflict(&replica_path, EntryKind::File, other) {
                        self.copy_file(&source_path, &replica_path, FileChange::Created);
                    }
                }
                (EntryKind::Other, _) => {
                    tracing::debug!("skipping special entry: {}", source_path.display());
                    self.stats.skipped += 1;
                }
            }
        }

        for (name, replica_kind) in &replica_entries {
            if source_entries.contains_key(name) {
                continue;
            }
            if self.should_stop() {
                return;
            }
            let reason = RemovalReason::MissingFromSource {
                source: source.join(name),
            };
            self.remove_entry(&replica.join(name), *replica_kind, reason);
        }
    }

    fn should_stop(&mut self) -> bool {
        if !self.cancelled && self.cancel.is_cancelled() {
            self.cancelled = true;
        }
        self.cancelled
    }

    fn create_dir(&mut self, replica: &Path) -> bool {
        if !self.options.dry_run {
            if let Err(err) = fs::create_dir_all(replica) {
                self.fail(EntryError::from_io(replica, EntryOp::CreateDir, err));
                return false;
            }
        }
        self.stats.created_dirs += 1;
        self.sink.emit(&SyncEvent::DirectoryCreated {
            path: replica.to_path_buf(),
            dry_run: self.options.dry_run,
        });
        true
    }

    /// Direct children by name, kinds taken without following links.
    fn list(&mut self, dir: &Path) -> Option<Listing> {
        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(err) => {
                self.fail(EntryError::from_io(dir, EntryOp::List, err));
                return None;
            }
        };

        let mut entries = Listing::new();
        for entry in read {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.fail(EntryError::from_io(dir, EntryOp::List, err));
                    continue;
                }
            };
            match entry.file_type() {
                Ok(ty) => {
                    entries.insert(entry.file_name(), EntryKind::from_file_type(ty));
                }
                Err(err) => self.fail(EntryError::from_io(entry.path(), EntryOp::List, err)),
            }
        }
        Some(entries)
    }

    fn update_file(&mut self, source: &Path, replica: &Path) {
        let digest = self.options.digest;
        let replica_digest = match digest_file(replica, digest) {
            Ok(d) => d,
            Err(err) => return self.fail(EntryError::from_io(replica, EntryOp::Checksum, err)),
        };
        let source_digest = match digest_file(source, digest) {
            Ok(d) => d,
            Err(err) => return self.fail(EntryError::from_io(source, EntryOp::Checksum, err)),
        };

        if replica_digest == source_digest {
            self.stats.unchanged += 1;
            return;
        }
        self.copy_file(source, replica, FileChange::Updated);
    }

    fn copy_file(&mut self, source: &Path, replica: &Path, change: FileChange) {
        if !self.options.dry_run {
            if let Err(err) = copy_preserving_times(source, replica) {
                return self.fail(err);
            }
        }
        match change {
            FileChange::Created => self.stats.copied += 1,
            FileChange::Updated => self.stats.updated += 1,
        }
        self.sink.emit(&SyncEvent::FileCopied {
            source: source.to_path_buf(),
            replica: replica.to_path_buf(),
            change,
            dry_run: self.options.dry_run,
        });
    }

    /// Returns whether the replica path is now free for the source's kind.
    fn resolve_conflict(
        &mut self,
        replica: &Path,
        source_kind: EntryKind,
        replica_kind: EntryKind,
    ) -> bool {
        if !self.options.replace_kind_conflicts {
            self.fail(EntryError::KindConflict {
                path: replica.to_path_buf(),
                source_kind,
                replica_kind,
            });
            return false;
        }
        let reason = RemovalReason::KindChanged {
            source_kind,
            replica_kind,
        };
        self.remove_entry(replica, replica_kind, reason)
    }

    fn remove_entry(&mut self, replica: &Path, kind: EntryKind, reason: RemovalReason) -> bool {
        let dry_run = self.options.dry_run;
        if kind == EntryKind::Directory {
            if !dry_run {
                match fs::remove_dir_all(replica) {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::NotFound => return true,
                    Err(err) => {
                        self.fail(EntryError::from_io(replica, EntryOp::RemoveDir, err));
                        return false;
                    }
                }
            }
            self.stats.removed_dirs += 1;
            self.sink.emit(&SyncEvent::DirectoryRemoved {
                path: replica.to_path_buf(),
                reason,
                dry_run,
            });
        } else {
            if !dry_run {
                match fs::remove_file(replica) {
                    Ok(()) => {}
                    // Vanished since the listing.
                    Err(err) if err.kind() == ErrorKind::NotFound => return true,
                    Err(err) => {
                        self.fail(EntryError::from_io(replica, EntryOp::RemoveFile, err));
                        return false;
                    }
                }
            }
            self.stats.removed_files += 1;
            self.sink.emit(&SyncEvent::FileRemoved {
                path: replica.to_path_buf(),
                reason,
                dry_run,
            });
        }
        true
    }

    fn fail(&mut self, err: EntryError) {
        self.stats.skipped += 1;
        self.sink.emit(&SyncEvent::EntryFailed {
            path: err.path().to_path_buf(),
            category: err.category().to_string(),
            message: err.to_string(),
        });
        self.errors.push(err);
    }
}

/// Copy through a uniquely named temporary in the target directory, carry
/// over permissions and access and modification times, then rename over the
/// target. The temporary is removed on any failure.
fn copy_preserving_times(source: &Path, replica: &Path) -> Result<(), EntryError> {
    let source_err = |e: io::Error| EntryError::from_io(source, EntryOp::Copy, e);
    let replica_err = |e: io::Error| EntryError::from_io(replica, EntryOp::Copy, e);

    let mut reader = File::open(source).map_err(source_err)?;
    let meta = reader.metadata().map_err(source_err)?;

    let parent = replica.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::Builder::new()
        .prefix(TMP_PREFIX)
        .suffix(TMP_SUFFIX)
        .tempfile_in(parent)
        .map_err(replica_err)?;
    io::copy(&mut reader, staged.as_file_mut()).map_err(replica_err)?;
    filetime::set_file_handle_times(
        staged.as_file(),
        Some(FileTime::from_last_access_time(&meta)),
        Some(FileTime::from_last_modification_time(&meta)),
    )
    .map_err(replica_err)?;
    staged
        .as_file()
        .set_permissions(meta.permissions())
        .map_err(replica_err)?;
    staged.persist(replica).map_err(|e| replica_err(e.error))?;
    Ok(())
}
