//! Validation of the source and replica roots.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::PathError;

/// Check the preconditions of a pass.
///
/// - `source` exists and is a directory;
/// - `replica` is a directory, or is absent with an existing parent directory;
/// - the two roots resolve to different locations and neither contains the other.
///
/// Symbolic links at the roots themselves are followed.
pub fn validate_roots(source: &Path, replica: &Path) -> Result<(), PathError> {
    match std::fs::metadata(source) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(PathError::SourceNotDirectory {
                path: source.to_path_buf(),
            })
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(PathError::SourceMissing {
                path: source.to_path_buf(),
            })
        }
        Err(err) => return Err(io_err(source, err)),
    }
    let source_real = std::fs::canonicalize(source).map_err(|e| io_err(source, e))?;
    let replica_real = resolve_replica(replica)?;

    if source_real == replica_real {
        return Err(PathError::SamePath {
            path: source.to_path_buf(),
        });
    }
    if replica_real.starts_with(&source_real) || source_real.starts_with(&replica_real) {
        return Err(PathError::NestedRoots {
            source_root: source.to_path_buf(),
            replica_root: replica.to_path_buf(),
        });
    }
    Ok(())
}

/// Canonical location of the replica root, which may not exist yet.
fn resolve_replica(replica: &Path) -> Result<PathBuf, PathError> {
    match std::fs::metadata(replica) {
        Ok(meta) if meta.is_dir() => {
            return std::fs::canonicalize(replica).map_err(|e| io_err(replica, e));
        }
        Ok(_) => {
            return Err(PathError::ReplicaNotDirectory {
                path: replica.to_path_buf(),
            })
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(replica, err)),
    }

    let parent = match replica.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let Some(name) = replica.file_name() else {
        return Err(PathError::ReplicaParentMissing {
            path: replica.to_path_buf(),
        });
    };
    match std::fs::metadata(parent) {
        Ok(meta) if meta.is_dir() => {
            let parent_real = std::fs::canonicalize(parent).map_err(|e| io_err(parent, e))?;
            Ok(parent_real.join(name))
        }
        _ => Err(PathError::ReplicaParentMissing {
            path: parent.to_path_buf(),
        }),
    }
}

fn io_err(path: &Path, source: std::io::Error) -> PathError {
    PathError::Io {
        path: path.to_path_buf(),
        source,
    }
}
