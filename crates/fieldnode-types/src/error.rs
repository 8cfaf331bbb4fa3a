//! Error types for parsing in fieldnode-types.

use thiserror::Error;

/// Errors that can occur when parsing node domain values.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Generic malformed input.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Unrecognized storage mode name.
    #[error("Unknown storage mode: {0}")]
    UnknownStorageMode(String),

    /// Unrecognized sync strategy name.
    #[error("Unknown sync strategy: {0}")]
    UnknownSyncStrategy(String),

    /// Partition date was not a valid `YYYYMMDD` calendar date.
    #[error("Invalid partition date: {0}")]
    InvalidPartitionDate(String),

    /// Timestamp cannot be represented as a calendar date.
    #[error("Timestamp {0} is out of range")]
    TimestampOutOfRange(u64),
}

/// Result type alias using fieldnode-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
