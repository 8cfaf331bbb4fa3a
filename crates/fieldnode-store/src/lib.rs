//! Durable, day-partitioned storage for fieldnode sensor readings.
//!
//! This crate keeps the node's readings on local media until the Hub has
//! acknowledged them. Records are appended to one CSV partition per day;
//! partitions whose records are all synced can be reclaimed when space
//! runs low or when they fall out of the retention window.
//!
//! # Features
//!
//! - Crash-safe appends and synced-flag rewrites
//! - Oldest-first retrieval of pending readings
//! - Persisted sync aggregate, rebuilt from the partitions on open
//! - Space accounting against a media capacity budget
//! - Reclaiming of fully synced partitions
//!
//! # Example
//!
//! ```no_run
//! use fieldnode_store::{Store, StoreOptions};
//! use fieldnode_types::StoredReading;
//!
//! let mut store = Store::open("/media/sd", StoreOptions::default())?;
//! store.append(&StoredReading::new(1_700_000_000, "temperature", 21.5, "°C", 1))?;
//!
//! let batch = store.pending(50)?;
//! // ... deliver the batch ...
//! store.mark_synced(&batch)?;
//! # Ok::<(), fieldnode_store::Error>(())
//! ```

pub mod codec;
mod error;
mod partition;
mod reclaim;
mod status;
mod store;

pub use error::{Error, Result};
pub use partition::PartitionInfo;
pub use reclaim::ReclaimReport;
pub use status::SyncStatus;
pub use store::{READINGS_DIR, STATUS_FILE, SpaceInfo, Store, StoreOptions};

/// Default media root following platform conventions.
///
/// - Linux: `~/.local/share/fieldnode`
/// - macOS: `~/Library/Application Support/fieldnode`
/// - Windows: `C:\Users\<user>\AppData\Local\fieldnode`
pub fn default_media_root() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("fieldnode")
}
