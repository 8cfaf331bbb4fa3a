//! Offline-first storage and Hub synchronization for field sensor nodes.
//!
//! A node keeps producing readings when the uplink is down. Readings are
//! appended to day partitions on local media and a sync engine pushes them
//! to the Hub once connectivity returns, backing off exponentially while it
//! is unreachable.
//!
//! # Features
//!
//! - **Storage modes**: remote only, local and remote, local only, or local
//!   with automatic sync
//! - **Sync strategies**: immediate, batched, scheduled or manual
//! - **Retry with backoff**: bounded exponential delay and an error state once
//!   the budget is spent
//! - **Space management**: synced partitions are reclaimed under pressure and
//!   after a retention window
//! - **Status surface**: pull-based snapshot plus a status LED pattern
//!
//! # Storage Modes
//!
//! | Mode | Stored locally | Sent inline | Synced later |
//! |------|----------------|-------------|--------------|
//! | `REMOTE_ONLY` | no | when connected | no |
//! | `LOCAL_AND_REMOTE` | yes | when connected | undelivered readings |
//! | `LOCAL_ONLY` | yes | no | no |
//! | `LOCAL_AUTOSYNC` | yes | no | yes |
//!
//! # Quick Start
//!
//! With the `hub-client` feature enabled:
//!
//! ```ignore
//! use fieldnode_core::{AlwaysConnected, Node, SystemClock};
//! use fieldnode_core::hub_client::HttpHubClient;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = HttpHubClient::new("http://hub.local:5000")?;
//!     let mut node = Node::open(
//!         "/media/sd",
//!         Default::default(),
//!         hub,
//!         AlwaysConnected,
//!         SystemClock::new(),
//!     )?;
//!
//!     node.store_reading("temperature", 21.5, "C", 3).await;
//!     node.tick().await;
//!
//!     for event in node.drain_events() {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
#[cfg(feature = "hub-client")]
pub mod hub_client;
pub mod mock;
pub mod node;
pub mod policy;
pub mod retry;
pub mod status;
pub mod sync;
pub mod traits;

pub use config::{
    CONFIG_FILE, ConfigError, ConfigManager, MAX_BATCH_SIZE, StorageConfig, ValidationError,
};
pub use error::{Error, HubError, Result};
pub use events::{EventQueue, SyncEvent, TriggerReason};
pub use mock::{ManualClock, MockHub, MockLink};
pub use node::Node;
pub use policy::StoragePolicy;
pub use retry::RetryConfig;
pub use status::{NodeStatus, StatusIndicator};
pub use sync::{SyncEngine, SyncOutcome, SyncResult};
pub use traits::{AlwaysConnected, Clock, Connectivity, HubClient, ReadingStore, SystemClock};

// Re-export the data model so callers need only this crate.
pub use fieldnode_store::{ReclaimReport, SpaceInfo, Store, StoreOptions, SyncStatus};
pub use fieldnode_types::{PartitionDate, StorageMode, StoredReading, SyncState, SyncStrategy};
