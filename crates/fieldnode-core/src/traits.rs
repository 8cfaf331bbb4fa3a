//! Trait abstractions for the node's collaborators.
//!
//! The sync engine and [`Node`](crate::Node) are generic over these traits so
//! that real transports, link monitors and clocks can be swapped for the
//! fakes in [`crate::mock`] in tests.

use std::time::Instant;

use async_trait::async_trait;
use time::OffsetDateTime;

use fieldnode_store::{ReclaimReport, SpaceInfo, Store, SyncStatus};
use fieldnode_types::{PartitionDate, StoredReading};

use crate::error::HubError;

/// Remote submit interface to the Hub.
///
/// Implementations must bound each call with a timeout; a timeout is
/// reported as an error and counts as a failed submission.
///
/// # Example
///
/// ```ignore
/// use fieldnode_core::HubClient;
///
/// async fn deliver<H: HubClient>(hub: &H, reading: &StoredReading) -> bool {
///     hub.submit_reading(reading).await.is_ok()
/// }
/// ```
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Submit one reading; `Ok` means the Hub acknowledged it.
    async fn submit_reading(&self, reading: &StoredReading) -> Result<(), HubError>;

    /// Whether an endpoint is configured at all.
    fn is_configured(&self) -> bool;
}

/// Connectivity predicate (WiFi, LTE, ...).
pub trait Connectivity: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Time source: monotonic milliseconds for deadlines, wall clock for
/// reading timestamps and partition dates.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary fixed origin; never goes backwards.
    fn now_ms(&self) -> u64;

    /// Current UTC wall-clock time.
    fn now_utc(&self) -> OffsetDateTime;
}

/// Operations the node needs from durable storage.
pub trait ReadingStore {
    fn append(&mut self, reading: &StoredReading) -> fieldnode_store::Result<PartitionDate>;
    fn pending(&self, max_count: usize) -> fieldnode_store::Result<Vec<StoredReading>>;
    fn mark_synced(&mut self, readings: &[StoredReading]) -> fieldnode_store::Result<usize>;
    fn pending_count(&self) -> u64;
    fn sync_status(&self) -> SyncStatus;
    fn space_accounting(&self) -> fieldnode_store::Result<SpaceInfo>;
    fn reclaim(&mut self, min_free_bytes: u64) -> fieldnode_store::Result<ReclaimReport>;
    fn reclaim_expired(
        &mut self,
        today: PartitionDate,
        keep_days: u32,
    ) -> fieldnode_store::Result<ReclaimReport>;
    fn record_sync_success(&mut self, count: usize, at: OffsetDateTime)
    -> fieldnode_store::Result<()>;
    fn record_sync_failure(&mut self, error: &str) -> fieldnode_store::Result<()>;
}

impl ReadingStore for Store {
    fn append(&mut self, reading: &StoredReading) -> fieldnode_store::Result<PartitionDate> {
        Store::append(self, reading)
    }

    fn pending(&self, max_count: usize) -> fieldnode_store::Result<Vec<StoredReading>> {
        Store::pending(self, max_count)
    }

    fn mark_synced(&mut self, readings: &[StoredReading]) -> fieldnode_store::Result<usize> {
        Store::mark_synced(self, readings)
    }

    fn pending_count(&self) -> u64 {
        Store::pending_count(self)
    }

    fn sync_status(&self) -> SyncStatus {
        Store::sync_status(self).clone()
    }

    fn space_accounting(&self) -> fieldnode_store::Result<SpaceInfo> {
        Store::space_accounting(self)
    }

    fn reclaim(&mut self, min_free_bytes: u64) -> fieldnode_store::Result<ReclaimReport> {
        Store::reclaim(self, min_free_bytes)
    }

    fn reclaim_expired(
        &mut self,
        today: PartitionDate,
        keep_days: u32,
    ) -> fieldnode_store::Result<ReclaimReport> {
        Store::reclaim_expired(self, today, keep_days)
    }

    fn record_sync_success(
        &mut self,
        count: usize,
        at: OffsetDateTime,
    ) -> fieldnode_store::Result<()> {
        Store::record_sync_success(self, count, at)
    }

    fn record_sync_failure(&mut self, error: &str) -> fieldnode_store::Result<()> {
        Store::record_sync_failure(self, error)
    }
}

/// Real clock backed by [`Instant`] and the system time.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Connectivity that is always up; useful for wired deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConnected;

impl Connectivity for AlwaysConnected {
    fn is_connected(&self) -> bool {
        true
    }
}
