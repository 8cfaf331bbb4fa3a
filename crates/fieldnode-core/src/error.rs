//! Error types for fieldnode-core.
//!
//! Errors fall into three groups with different recovery strategies:
//!
//! | Error | Strategy |
//! |-------|----------|
//! | [`Error::Store`] | Surface immediately; the reading is dropped and counted |
//! | [`Error::Hub`] | Recovered by the sync engine through retry and backoff |
//! | [`Error::Config`] | Fix the configuration; nothing is retried |
//!
//! Media errors are never retried by the store itself. Transport errors never
//! abort the node; once the retry budget is spent the engine parks in
//! [`SyncState::Error`](fieldnode_types::SyncState::Error) and reports it
//! through the status surface.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur in the node core.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Local storage failure.
    #[error("Storage error: {0}")]
    Store(#[from] fieldnode_store::Error),

    /// Configuration could not be loaded, validated or saved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Remote submission failed.
    #[error("Hub error: {0}")]
    Hub(#[from] HubError),

    /// Reading rejected before reaching storage.
    #[error("Invalid reading: {0}")]
    InvalidReading(String),
}

/// Errors reported by a [`HubClient`](crate::traits::HubClient).
///
/// Every variant counts as a failed submission; none of them is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum HubError {
    /// No Hub endpoint configured.
    #[error("Hub client not configured")]
    NotConfigured,

    /// The Hub could not be reached.
    #[error("Hub not reachable at {url}: {message}")]
    NotReachable { url: String, message: String },

    /// The request did not complete in time.
    #[error("Hub request timed out after {0:?}")]
    Timeout(Duration),

    /// The Hub answered with a non-success status.
    #[error("Hub rejected reading (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The configured Hub URL is unusable.
    #[error("Invalid Hub URL: {0}")]
    InvalidUrl(String),

    /// Any other transport-level failure.
    #[error("Hub transport error: {0}")]
    Transport(String),
}

/// Result type alias using fieldnode-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
