//! `dirsync checksum`: print file digests.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::DigestArg;

/// Arguments for `dirsync checksum`.
#[derive(Args, Debug)]
pub struct ChecksumArgs {
    /// Files to hash.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Hash function: md5 or sha256.
    #[arg(long = "hash", visible_alias = "ha", default_value_t = DigestArg::default())]
    pub hash: DigestArg,
}

impl ChecksumArgs {
    pub fn run(self) -> Result<()> {
        for file in &self.files {
            let hex = dirsync_sync::checksum(file, self.hash.into())
                .with_context(|| format!("cannot checksum {}", file.display()))?;
            println!("{hex}  {}", file.display());
        }
        Ok(())
    }
}
