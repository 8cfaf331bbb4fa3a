//! Platform-agnostic types for fieldnode sensor nodes.
//!
//! This crate provides the shared vocabulary used by the storage
//! (fieldnode-store), sync (fieldnode-core) and service layers.
//!
//! # Features
//!
//! - Sensor readings as persisted on the node's media
//! - Storage modes, sync strategies and sync engine states
//! - Day partition identifiers
//! - Error types for parsing
//!
//! # Example
//!
//! ```
//! use fieldnode_types::{StorageMode, StoredReading};
//!
//! let reading = StoredReading::new(1_700_000_000, "temperature", 21.5, "°C", 3);
//! assert!(!reading.synced);
//! assert_eq!(StorageMode::default().as_str(), "LOCAL_AUTOSYNC");
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    PartitionDate, ReadingKey, StorageMode, StoredReading, SyncState, SyncStrategy,
};
