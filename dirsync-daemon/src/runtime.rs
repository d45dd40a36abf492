use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use dirsync_core::{config, validate_roots, SyncConfig};
use dirsync_sync::{
    CancelToken, EventSink, LogSink, PassReport, Reconciler, SyncError, SyncOptions,
};

use crate::error::{io_err, DaemonError};
use crate::log_rotation::{MAX_LOG_BYTES, MAX_ROTATED_FILES};
use crate::logging::{init_tracing, LogFile, LogFormat};

/// Totals over the scheduler's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerSummary {
    /// Passes that ran to completion or cancellation.
    pub passes: u64,
    /// Passes rejected up front because a root became invalid.
    pub failed_passes: u64,
    /// Entry errors summed over every pass.
    pub entry_errors: usize,
    /// Stopped by a shutdown signal rather than by the pass limit.
    pub interrupted: bool,
}

/// Runs a pass, sleeps for the configured interval, and repeats until a
/// shutdown signal arrives.
///
/// The next pass never starts before the previous one, recursion included,
/// has finished, so one scheduler never overlaps passes on its pair.
pub struct Scheduler {
    config: SyncConfig,
    sink: Arc<dyn EventSink>,
    cancel: CancelToken,
    max_passes: Option<u64>,
    log_file: Option<LogFile>,
}

impl Scheduler {
    pub fn new(config: SyncConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            sink,
            cancel: CancelToken::new(),
            max_passes: None,
            log_file: None,
        }
    }

    /// Stop on its own after `passes` passes.
    pub fn with_max_passes(mut self, passes: u64) -> Self {
        self.max_passes = Some(passes);
        self
    }

    /// Rotate this log file between passes and flush it on exit.
    pub fn with_log_file(mut self, log_file: LogFile) -> Self {
        self.log_file = Some(log_file);
        self
    }

    /// Token the scheduler trips when a shutdown arrives mid-pass.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run until `shutdown` fires (or its sender is dropped).
    ///
    /// A shutdown during a pass cancels it cooperatively and waits for it to
    /// stop between entries; a shutdown during the sleep ends the wait at once.
    pub async fn run(
        self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<SchedulerSummary, DaemonError> {
        let mut summary = SchedulerSummary::default();

        loop {
            let mut pass = self.spawn_pass();
            let joined = tokio::select! {
                joined = &mut pass => joined,
                _ = shutdown.recv() => {
                    tracing::info!("stop requested, finishing the current pass");
                    self.cancel.cancel();
                    summary.interrupted = true;
                    pass.await
                }
            };
            let outcome = joined.map_err(|err| DaemonError::Join {
                task: "sync pass",
                message: err.to_string(),
            })?;

            summary.passes += 1;
            match outcome {
                Ok(report) => {
                    summary.entry_errors += report.errors.len();
                    if !report.errors.is_empty() {
                        tracing::warn!(
                            errors = report.errors.len(),
                            "pass finished with entry errors; they are retried next pass",
                        );
                    }
                }
                Err(err) => {
                    summary.failed_passes += 1;
                    tracing::error!(error = %err, "synchronization pass rejected");
                }
            }

            self.rotate_log();

            if summary.interrupted {
                break;
            }
            if self.max_passes.is_some_and(|max| summary.passes >= max) {
                break;
            }

            tracing::info!(
                interval_secs = self.config.interval_secs,
                "Synchronization completed. Waiting for the next interval...",
            );
            tokio::select! {
                _ = shutdown.recv() => {
                    summary.interrupted = true;
                    break;
                }
                _ = tokio::time::sleep(self.config.interval()) => {}
            }
        }

        if summary.interrupted {
            tracing::info!(passes = summary.passes, "Synchronization stopped by the user.");
        }
        if let Some(log) = &self.log_file {
            log.flush().map_err(|e| io_err(log.path(), e))?;
        }
        Ok(summary)
    }

    fn spawn_pass(&self) -> JoinHandle<Result<PassReport, SyncError>> {
        let config = self.config.clone();
        let sink = self.sink.clone();
        let cancel = self.cancel.clone();
        tokio::task::spawn_blocking(move || {
            Reconciler::new(SyncOptions::from(&config), sink.as_ref())
                .with_cancel(cancel)
                .run(&config.source, &config.replica)
        })
    }

    fn rotate_log(&self) {
        let Some(log) = &self.log_file else { return };
        match log.rotate_if_needed(MAX_LOG_BYTES, MAX_ROTATED_FILES) {
            Ok(true) => tracing::info!(path = %log.path().display(), "log file rotated"),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(path = %log.path().display(), error = %err, "log rotation failed")
            }
        }
    }
}

/// Open the log, install tracing, validate the roots, and run the scheduler
/// on a fresh tokio runtime until ctrl-c. Blocks the current thread.
///
/// Invalid roots are fatal here: no pass runs.
pub fn start_blocking(
    config: SyncConfig,
    format: LogFormat,
    max_passes: Option<u64>,
) -> Result<SchedulerSummary, DaemonError> {
    config.validate()?;
    let log_path = config::log_file_path(config.log.as_deref())?;
    let log_file = LogFile::open(&log_path)?;
    init_tracing(Some(log_file.clone()), format);

    tracing::info!(
        source = %config.source.display(),
        replica = %config.replica.display(),
        hash = %config.digest,
        interval_secs = config.interval_secs,
        log = %log_path.display(),
        "starting periodic synchronization",
    );
    if let Err(err) = validate_roots(&config.source, &config.replica) {
        tracing::error!(error = %err, "cannot start synchronization");
        return Err(err.into());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;

    runtime.block_on(async move {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(4);
        let signal_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("received ctrl-c, shutting down"),
                Err(err) => tracing::error!(error = %err, "ctrl-c handler failed, shutting down"),
            }
            let _ = shutdown_tx.send(());
        });

        let mut scheduler = Scheduler::new(config, Arc::new(LogSink)).with_log_file(log_file);
        if let Some(max) = max_passes {
            scheduler = scheduler.with_max_passes(max);
        }
        let result = scheduler.run(shutdown_rx).await;
        signal_handle.abort();
        result
    })
}
