//! Policy error types.

use thiserror::Error;

/// Policy errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The rule set is invalid (e.g. an unknown category code format).
    #[error("invalid rule set: {0}")]
    Invalid(String),

    /// Failed to parse a rule-set file.
    #[error("failed to parse rule set: {0}")]
    Parse(String),

    /// A resource kind string did not match the closed set.
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    /// An I/O error occurred while reading the rule set.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
