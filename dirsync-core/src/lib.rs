//! dirsync core library: domain types, configuration, root validation, errors.
//!
//! Public API surface:
//! - [`types`]: digest choice, entry kinds, sync configuration
//! - [`error`]: [`PathError`], [`ConfigError`]
//! - [`config`]: YAML config loading and command-line overrides
//! - [`paths`]: source/replica root validation

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use error::{ConfigError, PathError};
pub use paths::validate_roots;
pub use types::{DigestChoice, EntryKind, SyncConfig};
