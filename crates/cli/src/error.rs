//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The database file does not exist.
    ///
    /// This typically means the catalog has not been seeded yet.
    #[error("database not found at {path}. Run 'labelguard init' first")]
    DatabaseNotFound { path: PathBuf },

    /// A trust tier argument was not in the closed set.
    #[error("unknown trust tier '{0}' (expected 'ordinary' or 'administrative')")]
    UnknownTier(String),

    /// Configuration is invalid or unreadable.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// An error occurred in the storage layer.
    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// An error occurred in the policy layer.
    #[error(transparent)]
    Policy(#[from] policy::Error),

    /// Failed to serialize a decision for output.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
