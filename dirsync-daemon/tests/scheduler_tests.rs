use std::fs;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::broadcast;

use dirsync_core::{DigestChoice, SyncConfig};
use dirsync_daemon::{LogFile, Scheduler};
use dirsync_sync::{FanoutSink, MemorySink, SyncEvent};

fn tree(tmp: &TempDir) -> SyncConfig {
    let source = tmp.path().join("source");
    fs::create_dir_all(source.join("docs")).unwrap();
    fs::write(source.join("a.txt"), "alpha").unwrap();
    fs::write(source.join("docs").join("b.txt"), "beta").unwrap();
    let mut config = SyncConfig::new(&source, tmp.path().join("replica"));
    config.interval_secs = 0.05;
    config.digest = DigestChoice::Md5;
    config
}

#[tokio::test]
async fn repeated_passes_converge_and_then_idle() {
    let tmp = TempDir::new().unwrap();
    let first = Arc::new(MemorySink::new());
    let second = Arc::new(MemorySink::new());
    let sink = FanoutSink::new().with(first.clone()).with(second.clone());
    let (_tx, rx) = broadcast::channel(1);

    let summary = Scheduler::new(tree(&tmp), Arc::new(sink))
        .with_max_passes(2)
        .run(rx)
        .await
        .unwrap();

    assert_eq!(summary.passes, 2);
    assert_eq!(summary.failed_passes, 0);
    assert_eq!(summary.entry_errors, 0);
    assert_eq!(
        fs::read_to_string(tmp.path().join("replica").join("docs").join("b.txt")).unwrap(),
        "beta"
    );

    let events = first.events();
    assert_eq!(events.len(), second.events().len());
    let completed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SyncEvent::PassCompleted { stats, .. } => Some(stats.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(completed.len(), 2);
    assert_eq!(completed[0].copied, 2);
    assert_eq!(completed[1].total_actions(), 0);
    assert_eq!(completed[1].unchanged, 2);
}

#[tokio::test]
async fn log_file_is_flushed_and_kept_on_exit() {
    let tmp = TempDir::new().unwrap();
    let log_path = tmp.path().join("logs").join("dirsync.log");
    let log = LogFile::open(&log_path).unwrap();
    let (_tx, rx) = broadcast::channel(1);

    Scheduler::new(tree(&tmp), Arc::new(MemorySink::new()))
        .with_log_file(log)
        .with_max_passes(1)
        .run(rx)
        .await
        .unwrap();

    assert!(log_path.is_file());
}

#[tokio::test]
async fn source_removed_between_passes_is_retried_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let config = tree(&tmp);
    let source = config.source.clone();
    let sink = Arc::new(MemorySink::new());
    let (tx, rx) = broadcast::channel(1);

    let mut config = config;
    config.interval_secs = 0.2;
    let handle = tokio::spawn(Scheduler::new(config, sink.clone()).with_max_passes(3).run(rx));

    while !sink
        .events()
        .iter()
        .any(|e| matches!(e, SyncEvent::PassCompleted { .. }))
    {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    fs::remove_dir_all(&source).unwrap();

    let summary = handle.await.unwrap().unwrap();
    drop(tx);
    assert_eq!(summary.passes, 3);
    assert_eq!(summary.failed_passes, 2);
    assert!(tmp.path().join("replica").join("a.txt").exists());
}
