use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use dirsync_core::{DigestChoice, EntryKind, PathError};
use dirsync_sync::{
    checksum, events::FileChange, reconcile, EntryError, LogSink, MemorySink, Reconciler,
    RemovalReason, SyncError, SyncEvent, SyncOptions,
};
use filetime::{set_file_mtime, FileTime};
use tempfile::TempDir;

struct Trees {
    _tmp: TempDir,
    source: PathBuf,
    replica: PathBuf,
}

fn trees() -> Trees {
    let tmp = TempDir::new().expect("tempdir");
    let source = tmp.path().join("source");
    let replica = tmp.path().join("replica");
    fs::create_dir_all(&source).expect("create source");
    Trees {
        _tmp: tmp,
        source,
        replica,
    }
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, content).expect("write file");
}

/// Relative path → file content for every file under `root`; directories end with `/`.
fn snapshot(root: &Path) -> Vec<(String, String)> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, String)>) {
        for entry in fs::read_dir(dir).expect("read_dir") {
            let entry = entry.expect("entry");
            let path = entry.path();
            let rel = path
                .strip_prefix(root)
                .expect("prefix")
                .to_string_lossy()
                .replace('\\', "/");
            if entry.file_type().expect("file type").is_dir() {
                out.push((format!("{rel}/"), String::new()));
                walk(root, &path, out);
            } else {
                out.push((rel, fs::read_to_string(&path).expect("read")));
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

fn run(t: &Trees, sink: &MemorySink) -> dirsync_sync::PassReport {
    reconcile(&t.source, &t.replica, DigestChoice::Sha256, sink).expect("pass")
}

fn action_events(sink: &MemorySink) -> Vec<SyncEvent> {
    sink.take()
        .into_iter()
        .filter(|e| {
            !matches!(
                e,
                SyncEvent::PassStarted { .. } | SyncEvent::PassCompleted { .. }
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn first_pass_creates_replica_and_copies_file() {
    let t = trees();
    write(&t.source.join("a.txt"), "hello");
    let sink = MemorySink::new();

    let report = run(&t, &sink);

    assert!(report.is_clean());
    assert_eq!(fs::read_to_string(t.replica.join("a.txt")).unwrap(), "hello");
    let events = action_events(&sink);
    assert_eq!(events.len(), 2, "events: {events:?}");
    assert!(matches!(&events[0], SyncEvent::DirectoryCreated { path, .. } if path == &t.replica));
    assert!(matches!(
        &events[1],
        SyncEvent::FileCopied { change: FileChange::Created, .. }
    ));
    assert_eq!(report.stats.created_dirs, 1);
    assert_eq!(report.stats.copied, 1);
}

#[test]
fn second_pass_without_changes_performs_no_actions() {
    let t = trees();
    write(&t.source.join("a.txt"), "hello");
    write(&t.source.join("docs/guide.md"), "# guide");
    let sink = MemorySink::new();

    run(&t, &sink);
    let before = snapshot(&t.replica);
    sink.take();

    let report = run(&t, &sink);

    assert_eq!(report.stats.total_actions(), 0);
    assert_eq!(report.stats.unchanged, 2);
    assert!(action_events(&sink).is_empty());
    assert_eq!(snapshot(&t.replica), before);
}

#[test]
fn deleted_source_file_is_removed_with_reason() {
    let t = trees();
    write(&t.source.join("a.txt"), "hello");
    let sink = MemorySink::new();
    run(&t, &sink);
    sink.take();

    fs::remove_file(t.source.join("a.txt")).unwrap();
    let report = run(&t, &sink);

    assert!(!t.replica.join("a.txt").exists());
    assert_eq!(report.stats.removed_files, 1);
    let events = action_events(&sink);
    assert_eq!(events.len(), 1);
    match &events[0] {
        SyncEvent::FileRemoved {
            path,
            reason: RemovalReason::MissingFromSource { source },
            ..
        } => {
            assert_eq!(path, &t.replica.join("a.txt"));
            assert_eq!(source, &t.source.join("a.txt"));
        }
        other => panic!("expected file removal, got {other:?}"),
    }
    assert!(events[0].to_string().contains("There is no a.txt in the source"));
}

#[test]
fn extra_replica_directory_removed_in_one_step() {
    let t = trees();
    write(&t.replica.join("old/deep/x.txt"), "x");
    write(&t.replica.join("old/y.txt"), "y");
    let sink = MemorySink::new();

    let report = run(&t, &sink);

    assert!(!t.replica.join("old").exists());
    assert_eq!(report.stats.removed_dirs, 1);
    assert_eq!(report.stats.removed_files, 0, "subtree is not removed entry by entry");
    let events = action_events(&sink);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], SyncEvent::DirectoryRemoved { .. }));
}

#[test]
fn nested_source_tree_is_mirrored() {
    let t = trees();
    write(&t.source.join("a.txt"), "a");
    write(&t.source.join("one/b.txt"), "b");
    write(&t.source.join("one/two/c.txt"), "c");
    fs::create_dir_all(t.source.join("empty")).unwrap();
    let sink = MemorySink::new();

    let report = run(&t, &sink);

    assert!(report.is_clean());
    assert_eq!(snapshot(&t.replica), snapshot(&t.source));
    // replica root, one, one/two, empty
    assert_eq!(report.stats.created_dirs, 4);
}

#[test]
fn mirror_invariant_after_mixed_changes() {
    let t = trees();
    write(&t.source.join("keep.txt"), "same");
    write(&t.source.join("change.txt"), "v1");
    write(&t.source.join("gone.txt"), "bye");
    write(&t.source.join("dir/inner.txt"), "inner");
    let sink = MemorySink::new();
    run(&t, &sink);

    write(&t.source.join("change.txt"), "v2");
    fs::remove_file(t.source.join("gone.txt")).unwrap();
    fs::remove_dir_all(t.source.join("dir")).unwrap();
    write(&t.source.join("new/fresh.txt"), "fresh");
    write(&t.replica.join("stray.txt"), "stray");

    let report = run(&t, &sink);

    assert!(report.is_clean());
    assert_eq!(snapshot(&t.replica), snapshot(&t.source));
    assert_eq!(report.stats.updated, 1);
    assert_eq!(report.stats.unchanged, 1);
    assert_eq!(report.stats.removed_dirs, 1);
    assert_eq!(report.stats.removed_files, 2);
}

#[test]
fn update_detected_despite_same_length_and_forged_mtime() {
    let t = trees();
    let src = t.source.join("a.txt");
    write(&src, "hello");
    let sink = MemorySink::new();
    run(&t, &sink);
    sink.take();

    let replica_meta = fs::metadata(t.replica.join("a.txt")).unwrap();
    let forged = FileTime::from_last_modification_time(&replica_meta);
    write(&src, "jello");
    set_file_mtime(&src, forged).unwrap();

    let report = run(&t, &sink);

    assert_eq!(report.stats.updated, 1);
    assert_eq!(fs::read_to_string(t.replica.join("a.txt")).unwrap(), "jello");
    let events = action_events(&sink);
    assert!(matches!(
        &events[0],
        SyncEvent::FileCopied { change: FileChange::Updated, .. }
    ));
}

#[test]
fn replica_edit_is_overwritten_from_source() {
    let t = trees();
    write(&t.source.join("a.txt"), "hello");
    let sink = MemorySink::new();
    run(&t, &sink);

    write(&t.replica.join("a.txt"), "tampered");
    let report = run(&t, &sink);

    assert_eq!(report.stats.updated, 1);
    assert_eq!(fs::read_to_string(t.replica.join("a.txt")).unwrap(), "hello");
}

#[test]
fn copied_file_keeps_source_modification_time() {
    let t = trees();
    let src = t.source.join("a.txt");
    write(&src, "hello");
    let old = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(24 * 60 * 60));
    set_file_mtime(&src, old).unwrap();

    run(&t, &MemorySink::new());

    let meta = fs::metadata(t.replica.join("a.txt")).unwrap();
    assert_eq!(FileTime::from_last_modification_time(&meta), old);
}

#[test]
fn replica_matches_checksums_for_both_digests() {
    for digest in DigestChoice::all() {
        let t = trees();
        write(&t.source.join("a.bin"), &"z".repeat(10_000));
        reconcile(&t.source, &t.replica, *digest, &MemorySink::new()).expect("pass");
        assert_eq!(
            checksum(&t.source.join("a.bin"), *digest).unwrap(),
            checksum(&t.replica.join("a.bin"), *digest).unwrap()
        );
    }
}

#[test]
fn stale_copy_temporary_is_cleaned_up() {
    let t = trees();
    write(&t.source.join("a.txt"), "hello");
    write(&t.replica.join(".dirsync-Xy12ab.tmp"), "half written");

    let report = run(&t, &MemorySink::new());

    assert!(report.is_clean());
    assert_eq!(snapshot(&t.replica), snapshot(&t.source));
}

#[test]
fn staged_copy_never_touches_a_sibling_with_a_temporary_looking_name() {
    let t = trees();
    write(&t.source.join("a.txt"), "v1");
    write(&t.source.join("a.txt.dirsync.tmp"), "user data");
    write(&t.source.join(".dirsync-data.tmp"), "more user data");
    assert!(run(&t, &MemorySink::new()).is_clean());

    write(&t.source.join("a.txt"), "v2");
    let report = run(&t, &MemorySink::new());

    assert!(report.is_clean(), "errors: {:?}", report.errors);
    assert_eq!(report.stats.updated, 1);
    assert_eq!(report.stats.unchanged, 2);
    assert_eq!(snapshot(&t.replica), snapshot(&t.source));
}

// ---------------------------------------------------------------------------
// Kind conflicts
// ---------------------------------------------------------------------------

#[test]
fn kind_conflict_is_reported_and_siblings_continue() {
    let t = trees();
    write(&t.source.join("docs/readme.md"), "docs");
    write(&t.source.join("z.txt"), "z");
    write(&t.replica.join("docs"), "i am a file");
    let sink = MemorySink::new();

    let report = run(&t, &sink);

    assert_eq!(report.errors.len(), 1);
    match &report.errors[0] {
        EntryError::KindConflict {
            path,
            source_kind,
            replica_kind,
        } => {
            assert_eq!(path, &t.replica.join("docs"));
            assert_eq!(*source_kind, EntryKind::Directory);
            assert_eq!(*replica_kind, EntryKind::File);
        }
        other => panic!("expected kind conflict, got {other:?}"),
    }
    assert_eq!(fs::read_to_string(t.replica.join("docs")).unwrap(), "i am a file");
    assert_eq!(fs::read_to_string(t.replica.join("z.txt")).unwrap(), "z");
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, SyncEvent::EntryFailed { category, .. } if category == "kind-conflict")));
}

#[test]
fn kind_conflict_replaced_when_enabled() {
    let t = trees();
    write(&t.source.join("docs/readme.md"), "docs");
    write(&t.source.join("notes"), "now a file");
    write(&t.replica.join("docs"), "i am a file");
    write(&t.replica.join("notes/old.txt"), "old");
    let sink = MemorySink::new();
    let options = SyncOptions {
        replace_kind_conflicts: true,
        ..SyncOptions::default()
    };

    let report = Reconciler::new(options, &sink)
        .run(&t.source, &t.replica)
        .expect("pass");

    assert!(report.is_clean(), "errors: {:?}", report.errors);
    assert_eq!(snapshot(&t.replica), snapshot(&t.source));
    assert!(sink.events().iter().any(|e| matches!(
        e,
        SyncEvent::DirectoryRemoved {
            reason: RemovalReason::KindChanged { .. },
            ..
        }
    )));
}

// ---------------------------------------------------------------------------
// Dry run
// ---------------------------------------------------------------------------

#[test]
fn dry_run_reports_actions_without_mutation() {
    let t = trees();
    write(&t.source.join("a.txt"), "hello");
    write(&t.source.join("sub/b.txt"), "b");
    write(&t.replica.join("extra.txt"), "extra");
    let before = snapshot(&t.replica);
    let sink = MemorySink::new();
    let options = SyncOptions {
        dry_run: true,
        ..SyncOptions::default()
    };

    let report = Reconciler::new(options, &sink)
        .run(&t.source, &t.replica)
        .expect("pass");

    assert!(report.dry_run);
    assert_eq!(snapshot(&t.replica), before, "dry run must not touch the replica");
    assert_eq!(report.stats.copied, 2);
    assert_eq!(report.stats.created_dirs, 1);
    assert_eq!(report.stats.removed_files, 1);
    assert!(sink
        .events()
        .iter()
        .filter(|e| !matches!(e, SyncEvent::PassCompleted { .. }))
        .all(|e| e.to_string().starts_with("[dry-run]")));
}

// ---------------------------------------------------------------------------
// Fatal path errors
// ---------------------------------------------------------------------------

#[test]
fn missing_source_fails_before_any_mutation() {
    let t = trees();
    fs::remove_dir_all(&t.source).unwrap();
    let sink = MemorySink::new();

    let err = reconcile(&t.source, &t.replica, DigestChoice::Md5, &sink).unwrap_err();

    assert!(matches!(err, SyncError::Path(PathError::SourceMissing { .. })));
    assert!(!t.replica.exists());
    assert!(sink.events().is_empty());
}

#[test]
fn same_source_and_replica_is_rejected() {
    let t = trees();
    let err = reconcile(&t.source, &t.source, DigestChoice::Md5, &MemorySink::new()).unwrap_err();
    assert!(matches!(err, SyncError::Path(PathError::SamePath { .. })));
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[test]
#[cfg(unix)]
fn unreadable_source_file_is_isolated() {
    use std::os::unix::fs::PermissionsExt;

    let t = trees();
    let locked = t.source.join("locked.txt");
    write(&locked, "secret");
    write(&t.source.join("open.txt"), "open");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::File::open(&locked).is_ok() {
        // Running with privileges that bypass permission bits.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }
    let sink = MemorySink::new();

    let report = run(&t, &sink);

    assert_eq!(report.errors.len(), 1);
    assert!(matches!(&report.errors[0], EntryError::Permission { path, .. } if path == &locked));
    assert_eq!(fs::read_to_string(t.replica.join("open.txt")).unwrap(), "open");
    assert!(!t.replica.join("locked.txt").exists());
    assert_eq!(snapshot(&t.replica), vec![("open.txt".to_string(), "open".to_string())]);

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    let report = run(&t, &sink);
    assert!(report.is_clean(), "next pass retries the entry");
    assert_eq!(fs::read_to_string(t.replica.join("locked.txt")).unwrap(), "secret");
}

#[test]
#[cfg(unix)]
fn read_only_replica_directory_is_isolated() {
    use dirsync_sync::EntryOp;
    use std::os::unix::fs::PermissionsExt;

    let t = trees();
    write(&t.source.join("locked/stale.txt"), "v1");
    write(&t.source.join("locked/kept.txt"), "kept");
    assert!(run(&t, &MemorySink::new()).is_clean());

    write(&t.source.join("locked/stale.txt"), "v2");
    write(&t.source.join("free/new.txt"), "new");
    write(&t.source.join("top.txt"), "top");
    let locked = t.replica.join("locked");
    write(&locked.join("orphan.txt"), "orphan");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
    if fs::File::create(locked.join("write-check")).is_ok() {
        // Running with privileges that bypass permission bits.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }
    let sink = MemorySink::new();

    let report = run(&t, &sink);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(report.errors.len(), 2, "errors: {:?}", report.errors);
    assert!(report.errors.iter().any(|e| matches!(
        e,
        EntryError::Permission { path, op: EntryOp::Copy, .. } if path == &locked.join("stale.txt")
    )));
    assert!(report.errors.iter().any(|e| matches!(
        e,
        EntryError::Permission { path, op: EntryOp::RemoveFile, .. } if path == &locked.join("orphan.txt")
    )));
    assert_eq!(report.stats.unchanged, 1);
    assert_eq!(fs::read_to_string(locked.join("stale.txt")).unwrap(), "v1");
    assert_eq!(fs::read_to_string(t.replica.join("free/new.txt")).unwrap(), "new");
    assert_eq!(fs::read_to_string(t.replica.join("top.txt")).unwrap(), "top");
    let failures = sink
        .events()
        .into_iter()
        .filter(|e| matches!(e, SyncEvent::EntryFailed { category, .. } if category == "permission"))
        .count();
    assert_eq!(failures, 2);

    let report = run(&t, &sink);
    assert!(report.is_clean(), "next pass retries both entries");
    assert_eq!(snapshot(&t.replica), snapshot(&t.source));
}

#[test]
#[cfg(unix)]
fn symlinks_in_source_are_skipped() {
    let t = trees();
    write(&t.source.join("target.txt"), "target");
    std::os::unix::fs::symlink(t.source.join("target.txt"), t.source.join("link.txt")).unwrap();

    let report = run(&t, &MemorySink::new());

    assert_eq!(report.stats.skipped, 1);
    assert!(fs::symlink_metadata(t.replica.join("link.txt")).is_err());
    assert!(t.replica.join("target.txt").exists());
}

#[test]
fn log_sink_accepts_every_event() {
    let _ = env_logger::builder().is_test(true).try_init();
    let t = trees();
    write(&t.source.join("a.txt"), "hello");
    let report = reconcile(&t.source, &t.replica, DigestChoice::Md5, &LogSink).expect("pass");
    assert!(report.is_clean());
}
