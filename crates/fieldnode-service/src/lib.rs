//! Node service for offline-first sensor nodes.
//!
//! This crate provides a service that:
//! - Reads sensor readings from a driver over stdin (see [`ingest`])
//! - Stores them on local media and syncs them to the Hub
//! - Probes the Hub link in the background
//! - Logs sync events, status snapshots and the status LED pattern
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/fieldnode/node.toml`:
//!
//! ```toml
//! [hub]
//! url = "http://hub.local:5000"
//! timeout_secs = 10
//!
//! [storage]
//! root = "/media/sd"
//! create_root = false
//! capacity_bytes = 67108864
//! reserved_bytes = 65536
//!
//! [scheduler]
//! tick_interval_ms = 1000
//! link_probe_interval_ms = 5000
//! link_probe_timeout_ms = 2000
//! ```
//!
//! Storage mode, sync strategy and retry policy live in `config.json` on the
//! media and are changed with the `mode` subcommand or by editing that file.

pub mod config;
pub mod ingest;
pub mod link;
pub mod runner;

pub use config::{Config, ConfigError, HubConfig, MediaConfig, SchedulerConfig};
pub use ingest::{IngestError, Input};
pub use link::SharedLink;
