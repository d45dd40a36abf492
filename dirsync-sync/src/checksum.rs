//! Streaming file checksums.
//!
//! The file is read in [`CHUNK_SIZE`] chunks through the selected digest's
//! incremental update and finalized to a lowercase hex string. Identical bytes
//! always give an identical string, whatever the path or filesystem.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::Md5;
use sha2::{Digest, Sha256};

use dirsync_core::DigestChoice;

use crate::error::{io_err, SyncError};

/// Read buffer size for checksum streaming.
pub const CHUNK_SIZE: usize = 4096;

/// Hex digest of the file at `path`.
///
/// The file is opened read-only and never modified. Fails with
/// [`SyncError::Io`] if the file is missing or unreadable, including when it
/// disappears or loses permissions mid-read.
pub fn checksum(path: &Path, choice: DigestChoice) -> Result<String, SyncError> {
    digest_file(path, choice).map_err(|e| io_err(path, e))
}

pub(crate) fn digest_file(path: &Path, choice: DigestChoice) -> io::Result<String> {
    let file = File::open(path)?;
    match choice {
        DigestChoice::Md5 => digest_reader::<Md5, _>(file),
        DigestChoice::Sha256 => digest_reader::<Sha256, _>(file),
    }
}

fn digest_reader<D: Digest, R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
