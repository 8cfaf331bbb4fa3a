//! The node facade: ingestion, sync scheduling and status.
//!
//! [`Node`] owns the store, the configuration and the sync engine, and is the
//! only API the host application talks to. Readings enter through
//! [`Node::store_reading`]; the host calls [`Node::tick`] once per scheduler
//! pass and drains [`Node::drain_events`] afterwards.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use fieldnode_store::{ReclaimReport, Store, StoreOptions};
use fieldnode_types::{PartitionDate, StorageMode, StoredReading, SyncState};

use crate::config::{ConfigError, ConfigManager, StorageConfig};
use crate::error::Result;
use crate::events::SyncEvent;
use crate::status::{NodeStatus, StatusIndicator};
use crate::sync::{SyncEngine, SyncResult};
use crate::traits::{Clock, Connectivity, HubClient, ReadingStore};

/// An offline-first sensor node.
///
/// # Example
///
/// ```no_run
/// use fieldnode_core::{AlwaysConnected, MockHub, Node, SystemClock};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> fieldnode_core::Result<()> {
///     let mut node = Node::open(
///         "/media/sd",
///         Default::default(),
///         MockHub::new(),
///         AlwaysConnected,
///         SystemClock::new(),
///     )?;
///
///     node.store_reading("temperature", 21.5, "C", 1).await;
///     node.tick().await;
///     println!("{} pending", node.pending_count());
///     Ok(())
/// }
/// ```
pub struct Node<S, H, L, C> {
    store: S,
    config: ConfigManager,
    engine: SyncEngine<H, L, C>,
    dropped_readings: u64,
    last_expiry_check: Option<PartitionDate>,
}

impl<H, L, C> Node<Store, H, L, C>
where
    H: HubClient,
    L: Connectivity,
    C: Clock,
{
    /// Open the store and configuration on a media root.
    pub fn open<P: AsRef<Path>>(
        root: P,
        options: StoreOptions,
        hub: H,
        link: L,
        clock: C,
    ) -> Result<Self> {
        let root = root.as_ref();
        let store = Store::open(root, options)?;
        let config = ConfigManager::in_media_root(root)?;
        info!(
            "Node opened on {} (mode={}, strategy={}, {} pending)",
            root.display(),
            config.config().mode,
            config.config().sync_strategy,
            store.pending_count()
        );
        Ok(Self::new(store, config, hub, link, clock))
    }
}

impl<S, H, L, C> Node<S, H, L, C>
where
    S: ReadingStore,
    H: HubClient,
    L: Connectivity,
    C: Clock,
{
    pub fn new(store: S, config: ConfigManager, hub: H, link: L, clock: C) -> Self {
        Self {
            store,
            config,
            engine: SyncEngine::new(hub, link, clock),
            dropped_readings: 0,
            last_expiry_check: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &SyncEngine<H, L, C> {
        &self.engine
    }

    pub fn config(&self) -> &StorageConfig {
        self.config.config()
    }

    /// Route one reading according to the storage mode.
    ///
    /// Returns `true` when the reading was stored locally or delivered to the
    /// Hub. A reading that ends up nowhere is counted in
    /// [`NodeStatus::dropped_readings`].
    pub async fn store_reading(
        &mut self,
        sensor_type: &str,
        value: f64,
        unit: &str,
        endpoint_id: i64,
    ) -> bool {
        let timestamp = u64::try_from(self.engine.clock().now_utc().unix_timestamp()).unwrap_or(0);
        let mut reading = StoredReading::new(timestamp, sensor_type, value, unit, endpoint_id);
        let policy = self.config().policy();

        let mut delivered = false;
        if policy.should_send_remote_immediately(self.engine.is_connected())
            && self.engine.hub().is_configured()
        {
            match self.engine.hub().submit_reading(&reading).await {
                Ok(()) => delivered = true,
                Err(e) => warn!("Immediate send of {} failed: {}", sensor_type, e),
            }
        }

        if !policy.should_store_locally() {
            if !delivered {
                self.drop_reading(&reading, "Hub unavailable and local storage disabled");
            }
            return delivered;
        }

        reading.synced = delivered;
        match self.append_with_reclaim(&reading) {
            Ok(date) => {
                debug!("Stored {} reading in partition {}", sensor_type, date);
                true
            }
            Err(e) if delivered => {
                warn!("Delivered {} reading but could not store it: {}", sensor_type, e);
                true
            }
            Err(e) => {
                self.drop_reading(&reading, &e.to_string());
                false
            }
        }
    }

    fn append_with_reclaim(&mut self, reading: &StoredReading) -> fieldnode_store::Result<PartitionDate> {
        let config = self.config();
        let (auto_cleanup, min_free) = (config.auto_cleanup, config.min_free_bytes);

        match self.store.append(reading) {
            Err(fieldnode_store::Error::OutOfSpace { .. }) if auto_cleanup => {
                info!("Out of space, reclaiming before retrying the append");
                self.reclaim_space(min_free);
                self.store.append(reading)
            }
            Ok(date) => {
                if auto_cleanup && self.free_below(min_free) {
                    self.reclaim_space(min_free);
                }
                Ok(date)
            }
            Err(e) => Err(e),
        }
    }

    fn free_below(&self, min_free: u64) -> bool {
        self.store
            .space_accounting()
            .map(|space| space.free < min_free)
            .unwrap_or(false)
    }

    fn drop_reading(&mut self, reading: &StoredReading, reason: &str) {
        self.dropped_readings += 1;
        error!(
            "Dropped {} reading ({} dropped so far): {}",
            reading.sensor_type, self.dropped_readings, reason
        );
        self.engine.emit(SyncEvent::ReadingDropped {
            sensor_type: reading.sensor_type.clone(),
            error: reason.to_string(),
        });
    }

    fn reclaim_space(&mut self, min_free: u64) {
        match self.store.reclaim(min_free) {
            Ok(report) => self.report_reclaim(report),
            Err(e) => warn!("Space reclaim failed: {}", e),
        }
    }

    fn report_reclaim(&mut self, report: ReclaimReport) {
        if report.deleted.is_empty() && report.target_met() {
            return;
        }
        self.engine.emit(SyncEvent::SpaceReclaimed {
            deleted: report.deleted,
            bytes_freed: report.bytes_freed,
            shortfall: report.shortfall,
        });
    }

    /// One scheduler pass: run the sync engine, then routine cleanup.
    pub async fn tick(&mut self) {
        let config = self.config.config().clone();
        self.engine.tick(&mut self.store, &config).await;

        if config.auto_cleanup {
            self.expire_synced(&config);
            if self.free_below(config.min_free_bytes) {
                self.reclaim_space(config.min_free_bytes);
            }
        }
    }

    /// Delete expired synced partitions, at most once per calendar day.
    fn expire_synced(&mut self, config: &StorageConfig) {
        let today = PartitionDate::from_datetime(self.engine.clock().now_utc());
        if self.last_expiry_check == Some(today) {
            return;
        }
        self.last_expiry_check = Some(today);

        match self.store.reclaim_expired(today, config.keep_synced_days) {
            Ok(report) => self.report_reclaim(report),
            Err(e) => warn!("Retention cleanup failed: {}", e),
        }
    }

    pub fn pending_count(&self) -> u64 {
        self.store.pending_count()
    }

    pub fn has_pending_readings(&self) -> bool {
        self.pending_count() > 0
    }

    /// Start a sync on the next tick regardless of strategy.
    pub fn trigger_sync(&mut self, force_all: bool) {
        self.engine.trigger_sync(force_all);
    }

    /// Operator-initiated sync: clears the retry budget, then triggers.
    pub fn manual_sync(&mut self, force_all: bool) {
        self.engine.reset_retries();
        self.engine.trigger_sync(force_all);
    }

    /// Sync button handler; a long press syncs everything.
    ///
    /// Returns `false` when the button is disabled in the configuration.
    pub fn sync_button_pressed(&mut self, long_press: bool) -> bool {
        if !self.config().enable_sync_button {
            debug!("Sync button disabled, ignoring press");
            return false;
        }
        self.manual_sync(long_press);
        true
    }

    pub fn sync_state(&self) -> SyncState {
        self.engine.state()
    }

    pub fn last_result(&self) -> Option<&SyncResult> {
        self.engine.last_result()
    }

    pub fn next_retry_time(&self) -> Option<u64> {
        self.engine.next_retry_time()
    }

    pub fn current_retry_delay(&self) -> Duration {
        self.engine.current_retry_delay()
    }

    pub fn reset_retries(&mut self) {
        self.engine.reset_retries();
    }

    pub fn dropped_readings(&self) -> u64 {
        self.dropped_readings
    }

    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        self.engine.drain_events()
    }

    /// Switch the storage mode; persists on change.
    pub fn set_mode(&mut self, mode: StorageMode) -> std::result::Result<bool, ConfigError> {
        self.config.set_mode(mode)
    }

    /// Replace the configuration; persists on change.
    pub fn update_config(&mut self, config: StorageConfig) -> std::result::Result<bool, ConfigError> {
        self.config.update(config)
    }

    /// Snapshot of storage, sync and connectivity.
    pub fn status(&self) -> NodeStatus {
        let (space, media_error) = match self.store.space_accounting() {
            Ok(space) => (Some(space), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let state = self.engine.state();
        let connected = self.engine.is_connected();
        let pending = self.store.pending_count();
        let indicator = self
            .config()
            .enable_status_led
            .then(|| StatusIndicator::derive(media_error.is_none(), state, connected, pending));

        NodeStatus {
            space,
            media_error,
            sync: self.store.sync_status(),
            state,
            connected,
            retry_count: self.engine.retry_count(),
            next_retry_at_ms: self.engine.next_retry_time(),
            current_retry_delay_ms: u64::try_from(self.engine.current_retry_delay().as_millis())
                .unwrap_or(u64::MAX),
            last_result: self.engine.last_result().cloned(),
            dropped_readings: self.dropped_readings,
            indicator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ManualClock, MockHub, MockLink};
    use time::macros::datetime;

    type TestNode = Node<Store, MockHub, MockLink, ManualClock>;

    struct Fixture {
        dir: tempfile::TempDir,
        node: TestNode,
        hub: MockHub,
        link: MockLink,
        clock: ManualClock,
    }

    fn fixture(mode: StorageMode, connected: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let hub = MockHub::new();
        let link = MockLink::new(connected);
        let clock = ManualClock::at(datetime!(2026-10-19 08:00 UTC));
        let mut node = Node::open(
            dir.path(),
            StoreOptions::default(),
            hub.clone(),
            link.clone(),
            clock.clone(),
        )
        .unwrap();
        node.update_config(StorageConfig {
            mode,
            inter_record_delay_ms: 0,
            ..Default::default()
        })
        .unwrap();
        Fixture {
            dir,
            node,
            hub,
            link,
            clock,
        }
    }

    #[tokio::test]
    async fn test_remote_only_sends_without_storing() {
        let mut f = fixture(StorageMode::RemoteOnly, true);
        assert!(f.node.store_reading("temperature", 21.0, "C", 1).await);
        assert_eq!(f.hub.submitted_count(), 1);
        assert_eq!(f.node.store().sync_status().total_readings, 0);
    }

    #[tokio::test]
    async fn test_remote_only_offline_drops() {
        let mut f = fixture(StorageMode::RemoteOnly, false);
        assert!(!f.node.store_reading("temperature", 21.0, "C", 1).await);
        assert_eq!(f.node.dropped_readings(), 1);
        assert!(
            f.node
                .drain_events()
                .iter()
                .any(|e| matches!(e, SyncEvent::ReadingDropped { .. }))
        );
    }

    #[tokio::test]
    async fn test_local_and_remote_stores_delivered_as_synced() {
        let mut f = fixture(StorageMode::LocalAndRemote, true);
        assert!(f.node.store_reading("co2", 800.0, "ppm", 3).await);
        assert_eq!(f.hub.submitted_count(), 1);
        assert_eq!(f.node.store().sync_status().total_readings, 1);
        assert_eq!(f.node.pending_count(), 0);

        f.hub.fail_from(0);
        assert!(f.node.store_reading("co2", 810.0, "ppm", 3).await);
        assert_eq!(f.node.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_local_only_never_sends() {
        let mut f = fixture(StorageMode::LocalOnly, true);
        assert!(f.node.store_reading("humidity", 45.0, "%", 2).await);
        f.node.tick().await;
        assert_eq!(f.hub.attempt_count(), 0);
        assert_eq!(f.node.pending_count(), 1);
        assert!(f.node.has_pending_readings());
    }

    #[tokio::test]
    async fn test_local_only_sync_request_stays_local() {
        let mut f = fixture(StorageMode::LocalOnly, true);
        f.node.store_reading("humidity", 45.0, "%", 2).await;

        assert!(f.node.sync_button_pressed(true));
        f.node.tick().await;

        assert_eq!(f.hub.attempt_count(), 0);
        assert_eq!(f.node.pending_count(), 1);
        assert_eq!(f.node.sync_state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_local_and_remote_delivered_readings_expire() {
        let mut f = fixture(StorageMode::LocalAndRemote, true);
        f.clock.set_utc(datetime!(2026-10-01 08:00 UTC));
        for i in 0..3 {
            assert!(f.node.store_reading("co2", 800.0 + i as f64, "ppm", 3).await);
            f.clock.advance(1_000);
        }
        assert_eq!(f.node.pending_count(), 0);
        assert!(f.node.store().list_partitions().unwrap()[0].fully_synced);

        f.clock.set_utc(datetime!(2026-10-30 08:00 UTC));
        f.node.tick().await;
        assert!(f.node.store().list_partitions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reading_uses_wall_clock_timestamp() {
        let mut f = fixture(StorageMode::LocalOnly, false);
        f.node.store_reading("pressure", 1013.2, "hPa", 1).await;
        let pending = f.node.store().pending(1).unwrap();
        assert_eq!(
            pending[0].timestamp,
            datetime!(2026-10-19 08:00 UTC).unix_timestamp() as u64
        );
    }

    #[tokio::test]
    async fn test_invalid_reading_is_dropped() {
        let mut f = fixture(StorageMode::LocalAutosync, false);
        assert!(!f.node.store_reading("bad\nsensor", 1.0, "C", 1).await);
        assert_eq!(f.node.dropped_readings(), 1);
        assert_eq!(f.node.status().dropped_readings, 1);
    }

    #[tokio::test]
    async fn test_manual_sync_resets_retries() {
        let mut f = fixture(StorageMode::LocalAutosync, true);
        let config = StorageConfig {
            max_retries: 1,
            inter_record_delay_ms: 0,
            ..Default::default()
        };
        f.node.update_config(config).unwrap();
        f.hub.fail_from(0);
        f.node.store_reading("temperature", 20.0, "C", 1).await;
        f.node.tick().await;
        assert_eq!(f.node.sync_state(), SyncState::Error);

        f.hub.clear_failures();
        f.node.manual_sync(false);
        f.node.tick().await;
        assert_eq!(f.node.sync_state(), SyncState::Idle);
        assert_eq!(f.node.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_button_respects_config() {
        let mut f = fixture(StorageMode::LocalAutosync, true);
        let config = StorageConfig {
            enable_sync_button: false,
            ..f.node.config().clone()
        };
        f.node.update_config(config).unwrap();
        assert!(!f.node.sync_button_pressed(false));
        assert_eq!(f.node.sync_state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let mut f = fixture(StorageMode::LocalAutosync, false);
        f.node.store_reading("temperature", 20.0, "C", 1).await;
        f.node.tick().await;

        let status = f.node.status();
        assert!(status.media_ok());
        assert_eq!(status.sync.pending_readings, 1);
        assert_eq!(status.state, SyncState::Idle);
        assert!(!status.connected);
        assert_eq!(status.indicator, Some(StatusIndicator::SolidOn));

        f.link.set_connected(true);
        f.node.tick().await;
        let status = f.node.status();
        assert_eq!(status.indicator, Some(StatusIndicator::Off));
        assert_eq!(status.last_result.unwrap().synced_count, 1);
    }

    #[tokio::test]
    async fn test_status_reports_media_error() {
        let mut f = fixture(StorageMode::LocalAutosync, true);
        std::fs::remove_dir_all(f.dir.path()).unwrap();

        assert!(!f.node.store_reading("temperature", 20.0, "C", 1).await);
        let status = f.node.status();
        assert!(!status.media_ok());
        assert_eq!(status.indicator, Some(StatusIndicator::Alternating));
    }

    #[tokio::test]
    async fn test_retention_cleanup_on_tick() {
        let mut f = fixture(StorageMode::LocalAutosync, true);
        f.node.store_reading("temperature", 20.0, "C", 1).await;
        f.node.tick().await;
        assert_eq!(f.node.store().list_partitions().unwrap().len(), 1);

        f.clock.set_utc(datetime!(2026-10-30 08:00 UTC));
        f.node.tick().await;
        assert!(f.node.store().list_partitions().unwrap().is_empty());
        assert!(
            f.node
                .drain_events()
                .iter()
                .any(|e| matches!(e, SyncEvent::SpaceReclaimed { .. }))
        );
    }

    #[tokio::test]
    async fn test_set_mode_persists() {
        let mut f = fixture(StorageMode::LocalAutosync, true);
        assert!(f.node.set_mode(StorageMode::LocalOnly).unwrap());
        let reloaded = ConfigManager::in_media_root(f.dir.path()).unwrap();
        assert_eq!(reloaded.config().mode, StorageMode::LocalOnly);
    }
}
