//! `dirsync watch`: periodic synchronization in the foreground.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use dirsync_core::config::{self, Overrides};
use dirsync_daemon::{start_blocking, LogFormat};

use crate::DigestArg;

/// Arguments for `dirsync watch`.
///
/// Positional values override the matching keys of `--config`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Directory to mirror.
    pub source: Option<PathBuf>,

    /// Directory kept identical to the source.
    pub replica: Option<PathBuf>,

    /// Seconds between passes (fractions allowed).
    pub interval: Option<f64>,

    /// Log file, or a directory that receives `dirsync.log`.
    pub log: Option<PathBuf>,

    /// Hash function: md5 or sha256 (default sha256).
    #[arg(long = "hash", visible_alias = "ha")]
    pub hash: Option<DigestArg>,

    /// YAML file supplying any of the values above.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Replace replica entries whose kind differs from the source.
    #[arg(long)]
    pub replace_kind_conflicts: bool,

    /// Stop after this many passes instead of waiting for ctrl-c.
    #[arg(long)]
    pub passes: Option<u64>,

    /// Line format of the log file.
    #[arg(long, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(f: LogFormatArg) -> Self {
        match f {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let overrides = Overrides {
            source: self.source,
            replica: self.replica,
            interval_secs: self.interval,
            log: self.log,
            digest: self.hash.map(Into::into),
            replace_kind_conflicts: self.replace_kind_conflicts,
        };
        let config = config::resolve(self.config.as_deref(), overrides)
            .context("invalid synchronization settings")?;

        let summary = start_blocking(config, self.log_format.into(), self.passes)
            .context("synchronization stopped with an error")?;
        if summary.entry_errors > 0 {
            eprintln!(
                "{} entry error(s) over {} pass(es); see the log for details",
                summary.entry_errors, summary.passes
            );
        }
        Ok(())
    }
}
