//! dirsync: one-way, checksum-verified directory mirroring.
//!
//! # Usage
//!
//! ```text
//! dirsync watch <source> <replica> <interval> [log] [--hash md5|sha256] [--config FILE]
//! dirsync sync <source> <replica> [--hash md5|sha256] [--dry-run] [--json]
//! dirsync checksum <file>... [--hash md5|sha256]
//! ```

mod commands;

use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{checksum::ChecksumArgs, sync::SyncArgs, watch::WatchArgs};
use dirsync_core::DigestChoice;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "dirsync",
    version,
    about = "Keep a replica directory an exact copy of a source directory",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synchronize periodically until interrupted with ctrl-c.
    Watch(WatchArgs),

    /// Run a single synchronization pass and report what changed.
    Sync(SyncArgs),

    /// Print file checksums the way the synchronizer computes them.
    Checksum(ChecksumArgs),
}

// ---------------------------------------------------------------------------
// Shared digest argument
// ---------------------------------------------------------------------------

/// Thin wrapper so clap can parse `DigestChoice` with a friendly error.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestArg(pub DigestChoice);

impl FromStr for DigestArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<DigestChoice>().map(Self).map_err(|_| {
            let expected: Vec<String> = DigestChoice::all().iter().map(|d| d.to_string()).collect();
            format!(
                "unknown hash function '{s}'; expected: {}",
                expected.join(", ")
            )
        })
    }
}

impl fmt::Display for DigestArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<DigestArg> for DigestChoice {
    fn from(d: DigestArg) -> Self {
        d.0
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

/// Accept the single-dash `-ha` spelling of `--hash` used by older scripts.
/// Clap would otherwise read it as `-h -a`.
fn normalize_legacy_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some("-ha") => OsString::from("--hash"),
            Some(s) if s.starts_with("-ha=") => OsString::from(format!("--hash={}", &s[4..])),
            _ => arg,
        })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse_from(normalize_legacy_args(std::env::args_os()));
    match cli.command {
        Commands::Watch(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Checksum(args) => args.run(),
    }
}
