//! Error types for fieldnode-store.

use std::path::PathBuf;

use fieldnode_types::PartitionDate;

/// Result type for fieldnode-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fieldnode-store.
///
/// All of these are media-level failures; the store never retries internally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The media root is missing or not a directory.
    #[error("Storage media not available at {0}")]
    NoMedia(PathBuf),

    /// Writing would take free space below the reserved minimum.
    #[error("Out of space: {needed} bytes needed, {free} free, {reserved} reserved")]
    OutOfSpace {
        needed: u64,
        free: u64,
        reserved: u64,
    },

    /// Attempted to delete a partition that still holds unsynced records.
    #[error("Partition {0} still has unsynced readings")]
    NotSynced(PartitionDate),

    /// No partition exists for the given date.
    #[error("Partition not found: {0}")]
    PartitionNotFound(PartitionDate),

    /// Record cannot be encoded on a single line.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Failed to create the media directory layout.
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// CSV encoding error.
    #[error("Encoding error: {0}")]
    Encoding(#[from] csv::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
