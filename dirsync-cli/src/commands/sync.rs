//! `dirsync sync`: a single pass with a human or JSON report.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use dirsync_core::SyncConfig;
use dirsync_sync::{
    EventSink, FileChange, MemorySink, PassReport, Reconciler, SyncEvent, SyncOptions,
};

use crate::DigestArg;

/// Arguments for `dirsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Directory to mirror.
    pub source: PathBuf,

    /// Directory made identical to the source.
    pub replica: PathBuf,

    /// Hash function: md5 or sha256.
    #[arg(long = "hash", visible_alias = "ha", default_value_t = DigestArg::default())]
    pub hash: DigestArg,

    /// Show what would change without touching the replica.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit a machine-readable pass summary.
    #[arg(long)]
    pub json: bool,

    /// Replace replica entries whose kind differs from the source.
    #[arg(long)]
    pub replace_kind_conflicts: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let mut config = SyncConfig::new(&self.source, &self.replica);
        config.digest = self.hash.into();
        config.replace_kind_conflicts = self.replace_kind_conflicts;
        config.validate().context("invalid synchronization settings")?;

        let options = SyncOptions {
            dry_run: self.dry_run,
            ..SyncOptions::from(&config)
        };

        let report = if self.json {
            let sink = MemorySink::new();
            let report = run_pass(&config, options, &sink)?;
            println!("{}", serde_json::to_string_pretty(&report.summary())?);
            report
        } else {
            run_pass(&config, options, &ConsoleSink)?
        };

        if !report.errors.is_empty() {
            bail!(
                "{} entr{} could not be synchronized",
                report.errors.len(),
                if report.errors.len() == 1 { "y" } else { "ies" }
            );
        }
        Ok(())
    }
}

fn run_pass(config: &SyncConfig, options: SyncOptions, sink: &dyn EventSink) -> Result<PassReport> {
    Reconciler::new(options, sink)
        .run(&config.source, &config.replica)
        .with_context(|| {
            format!(
                "cannot synchronize {} into {}",
                config.source.display(),
                config.replica.display()
            )
        })
}

/// Prints each event as it happens, one line per action.
struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&self, event: &SyncEvent) {
        let line = event.to_string();
        match event {
            SyncEvent::PassStarted { .. } => println!("{}", line.bold()),
            SyncEvent::DirectoryCreated { .. }
            | SyncEvent::FileCopied {
                change: FileChange::Created,
                ..
            } => println!("  {} {line}", "+".green()),
            SyncEvent::FileCopied { .. } => println!("  {} {line}", "~".yellow()),
            SyncEvent::DirectoryRemoved { .. } | SyncEvent::FileRemoved { .. } => {
                println!("  {} {line}", "-".red())
            }
            SyncEvent::EntryFailed { .. } => eprintln!("  {} {}", "✗".red(), line.red()),
            SyncEvent::PassCompleted { errors, .. } if *errors > 0 => {
                println!("{}", line.yellow())
            }
            SyncEvent::PassCompleted { .. } => println!("{} {line}", "✓".green()),
        }
    }
}
