//! YAML configuration file and command-line overrides.
//!
//! # File format
//!
//! ```yaml
//! source: /data/source
//! replica: /backup/replica
//! interval_secs: 30
//! log: /var/log/dirsync       # file, or directory receiving dirsync.log
//! digest: sha256              # md5 | sha256
//! replace_kind_conflicts: false
//! ```
//!
//! Every key is optional in the file; values given on the command line win
//! field by field. After merging, `source` and `replica` must be present.
//!
//! # API pattern
//!
//! Functions that depend on the home directory come in two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{DigestChoice, SyncConfig, DEFAULT_INTERVAL_SECS};

/// File name used when the log destination is a directory.
pub const LOG_FILE_NAME: &str = "dirsync.log";

/// On-disk config document. All keys optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub source: Option<PathBuf>,
    pub replica: Option<PathBuf>,
    pub interval_secs: Option<f64>,
    pub log: Option<PathBuf>,
    pub digest: Option<DigestChoice>,
    pub replace_kind_conflicts: Option<bool>,
}

/// Values supplied on the command line. `None` defers to the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub source: Option<PathBuf>,
    pub replica: Option<PathBuf>,
    pub interval_secs: Option<f64>,
    pub log: Option<PathBuf>,
    pub digest: Option<DigestChoice>,
    pub replace_kind_conflicts: bool,
}

/// Load a config document from `path`.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<ConfigFile, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge an optional config file with command-line overrides and validate.
pub fn resolve(config_file: Option<&Path>, overrides: Overrides) -> Result<SyncConfig, ConfigError> {
    let file = match config_file {
        Some(path) => load_at(path)?,
        None => ConfigFile::default(),
    };

    let source = overrides
        .source
        .or(file.source)
        .ok_or(ConfigError::Missing("source"))?;
    let replica = overrides
        .replica
        .or(file.replica)
        .ok_or(ConfigError::Missing("replica"))?;

    let config = SyncConfig {
        source,
        replica,
        interval_secs: overrides
            .interval_secs
            .or(file.interval_secs)
            .unwrap_or(DEFAULT_INTERVAL_SECS),
        log: overrides.log.or(file.log),
        digest: overrides.digest.or(file.digest).unwrap_or_default(),
        replace_kind_conflicts: overrides.replace_kind_conflicts
            || file.replace_kind_conflicts.unwrap_or(false),
    };
    config.validate()?;
    Ok(config)
}

/// `<home>/.dirsync/logs/dirsync.log`: pure, no I/O.
pub fn default_log_path_at(home: &Path) -> PathBuf {
    home.join(".dirsync").join("logs").join(LOG_FILE_NAME)
}

/// `default_log_path_at` convenience wrapper.
pub fn default_log_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    Ok(default_log_path_at(&home))
}

/// Resolve where log lines are written.
///
/// An existing directory receives `dirsync.log`; anything else is used as the
/// file path itself. `None` falls back to [`default_log_path`].
pub fn log_file_path(log: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match log {
        Some(path) if path.is_dir() => Ok(path.join(LOG_FILE_NAME)),
        Some(path) => Ok(path.to_path_buf()),
        None => default_log_path(),
    }
}
