//! Sync engine state machine.
//!
//! The engine reconciles the local store with the Hub. It is driven by one
//! [`SyncEngine::tick`] per scheduler pass; a tick evaluates the state
//! transitions and then submits at most one batch if the engine is syncing.
//!
//! ```text
//!            trigger_sync()                    any state
//!                  |                               |
//!   IDLE --(strategy says go)--> SYNCING <---------+
//!    ^                           |  |  ^
//!    |   nothing pending         |  |  | deadline passed, connected
//!    +---------------------------+  |  |
//!                                   v  |
//!          failure / link lost --> WAITING
//!                                   |
//!          retries exhausted -----> ERROR --(connected + pending)--> SYNCING
//!                                         --(nothing pending)-----> IDLE
//! ```
//!
//! Delivery is at-least-once: a reading is marked synced only after the Hub
//! acknowledged it, so a crash between acknowledgment and marking re-sends
//! it later.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use fieldnode_types::{StoredReading, SyncState, SyncStrategy};

use crate::config::StorageConfig;
use crate::error::HubError;
use crate::events::{EventQueue, SyncEvent, TriggerReason};
use crate::traits::{Clock, Connectivity, HubClient, ReadingStore};

/// Consecutive per-record failures that abort a batch.
pub const MAX_CONSECUTIVE_FAILURES: usize = 3;

/// How often a waiting engine re-checks an absent link.
pub const LINK_PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// How a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Every reading in the batch was acknowledged.
    Complete,
    /// Some readings were acknowledged, others failed.
    Partial,
    /// Nothing was acknowledged.
    Failed,
}

/// Result of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub outcome: SyncOutcome,
    /// Readings acknowledged by the Hub.
    pub synced_count: usize,
    /// Readings of the batch that were not delivered (failed or skipped
    /// after the batch was aborted).
    pub failed_count: usize,
    /// Last error seen, if any.
    pub error: Option<String>,
}

impl SyncResult {
    fn failed(failed_count: usize, error: impl Into<String>) -> Self {
        Self {
            outcome: SyncOutcome::Failed,
            synced_count: 0,
            failed_count,
            error: Some(error.into()),
        }
    }

    /// True only when the whole batch was delivered.
    pub fn is_success(&self) -> bool {
        self.outcome == SyncOutcome::Complete
    }

    /// True when at least one reading was delivered.
    pub fn made_progress(&self) -> bool {
        self.synced_count > 0
    }
}

/// The sync engine.
///
/// Owns the remote collaborators; the store is lent to each call so that the
/// [`Node`](crate::Node) stays its single owner.
pub struct SyncEngine<H, L, C> {
    hub: H,
    link: L,
    clock: C,
    state: SyncState,
    retry_count: u32,
    current_retry_delay: Duration,
    next_retry_at_ms: u64,
    last_scheduled_sync_ms: u64,
    force_all: bool,
    was_connected: bool,
    last_result: Option<SyncResult>,
    events: EventQueue,
}

impl<H, L, C> SyncEngine<H, L, C>
where
    H: HubClient,
    L: Connectivity,
    C: Clock,
{
    pub fn new(hub: H, link: L, clock: C) -> Self {
        let was_connected = link.is_connected();
        Self {
            hub,
            link,
            clock,
            state: SyncState::Idle,
            retry_count: 0,
            current_retry_delay: Duration::ZERO,
            next_retry_at_ms: 0,
            last_scheduled_sync_ms: 0,
            force_all: false,
            was_connected,
            last_result: None,
            events: EventQueue::default(),
        }
    }

    pub fn hub(&self) -> &H {
        &self.hub
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Delay chosen for the pending retry (zero when none is pending).
    pub fn current_retry_delay(&self) -> Duration {
        self.current_retry_delay
    }

    /// Monotonic deadline of the next retry or link probe, while waiting or
    /// in the error state.
    pub fn next_retry_time(&self) -> Option<u64> {
        matches!(self.state, SyncState::Waiting | SyncState::Error).then_some(self.next_retry_at_ms)
    }

    pub fn last_result(&self) -> Option<&SyncResult> {
        self.last_result.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub(crate) fn emit(&mut self, event: SyncEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        self.events.drain()
    }

    /// Force the engine into SYNCING from any state.
    ///
    /// With `force_all`, the next batch takes every pending reading.
    pub fn trigger_sync(&mut self, force_all: bool) {
        self.trigger(force_all, TriggerReason::Manual);
    }

    fn trigger(&mut self, force_all: bool, reason: TriggerReason) {
        info!(?reason, force_all, "Sync triggered");
        self.force_all |= force_all;
        self.emit(SyncEvent::SyncTriggered { reason, force_all });
        self.set_state(SyncState::Syncing);
    }

    /// Clear retry bookkeeping; WAITING and ERROR fall back to IDLE.
    pub fn reset_retries(&mut self) {
        self.retry_count = 0;
        self.current_retry_delay = Duration::ZERO;
        self.next_retry_at_ms = 0;
        if matches!(self.state, SyncState::Waiting | SyncState::Error) {
            self.set_state(SyncState::Idle);
        }
    }

    fn set_state(&mut self, to: SyncState) {
        let from = self.state;
        if from != to {
            debug!("Sync state {} -> {}", from, to);
            self.state = to;
            self.emit(SyncEvent::StateChanged { from, to });
        }
    }

    /// One scheduler pass: evaluate transitions, then run at most one batch.
    pub async fn tick<S: ReadingStore>(&mut self, store: &mut S, config: &StorageConfig) {
        let now = self.clock.now_ms();
        let connected = self.link.is_connected();
        let policy = config.policy();

        if connected != self.was_connected {
            info!(connected, "Connectivity changed");
            self.emit(SyncEvent::LinkChanged { connected });
            if connected && policy.is_autosync() && store.pending_count() > 0 {
                self.trigger(false, TriggerReason::LinkRestored);
            }
            self.was_connected = connected;
        }

        if !policy.is_remote_sync_enabled() {
            self.stand_down();
            return;
        }

        match self.state {
            SyncState::Idle => {
                if self.should_sync(store, config, connected, now) {
                    self.set_state(SyncState::Syncing);
                }
            }
            SyncState::Waiting => {
                if now >= self.next_retry_at_ms {
                    if connected {
                        self.set_state(SyncState::Syncing);
                    } else {
                        self.next_retry_at_ms = now.saturating_add(probe_ms());
                    }
                }
            }
            SyncState::Syncing => {
                if !connected {
                    info!("Link lost while syncing, waiting for it to return");
                    self.next_retry_at_ms = now.saturating_add(probe_ms());
                    self.set_state(SyncState::Waiting);
                }
            }
            SyncState::Error => {
                if now >= self.next_retry_at_ms {
                    if store.pending_count() == 0 {
                        self.set_state(SyncState::Idle);
                    } else if connected {
                        self.set_state(SyncState::Syncing);
                    }
                }
            }
        }

        if self.state == SyncState::Syncing {
            self.run_batch(store, config).await;
        }
    }

    /// Drop any sync in progress or scheduled while the mode keeps readings
    /// on the node.
    fn stand_down(&mut self) {
        self.force_all = false;
        if self.state != SyncState::Idle {
            info!("Remote sync disabled by storage mode, stopping sync");
            self.retry_count = 0;
            self.current_retry_delay = Duration::ZERO;
            self.next_retry_at_ms = 0;
            self.set_state(SyncState::Idle);
        }
    }

    fn should_sync<S: ReadingStore>(
        &self,
        store: &S,
        config: &StorageConfig,
        connected: bool,
        now: u64,
    ) -> bool {
        if !connected || !self.hub.is_configured() {
            return false;
        }
        let pending = store.pending_count();
        if pending == 0 {
            return false;
        }
        match config.sync_strategy {
            SyncStrategy::Immediate => true,
            SyncStrategy::Batch => pending >= config.batch_size as u64,
            SyncStrategy::Scheduled => {
                now.saturating_sub(self.last_scheduled_sync_ms) >= config.sync_interval_ms
            }
            SyncStrategy::Manual => false,
        }
    }

    async fn run_batch<S: ReadingStore>(&mut self, store: &mut S, config: &StorageConfig) {
        let limit = if std::mem::take(&mut self.force_all) {
            usize::MAX
        } else {
            config.batch_size.max(1)
        };

        let batch = match store.pending(limit) {
            Ok(batch) => batch,
            Err(e) => {
                error!("Failed to read pending readings: {}", e);
                let result = SyncResult::failed(0, e.to_string());
                self.finish_batch(store, config, result, 0);
                return;
            }
        };

        if batch.is_empty() {
            debug!("Nothing pending, sync finished");
            self.set_state(SyncState::Idle);
            return;
        }

        let (result, marked) = if self.hub.is_configured() {
            self.emit(SyncEvent::BatchStarted { size: batch.len() });
            debug!("Submitting batch of {} readings", batch.len());
            let submitted = self.submit_batch(&batch, config).await;
            mark_acknowledged(store, &batch, submitted)
        } else {
            (
                SyncResult::failed(batch.len(), HubError::NotConfigured.to_string()),
                0,
            )
        };

        self.finish_batch(store, config, result, marked);
    }

    /// Submit readings one at a time; returns the acknowledged subset and the
    /// last error.
    async fn submit_batch(
        &self,
        batch: &[StoredReading],
        config: &StorageConfig,
    ) -> (Vec<StoredReading>, Option<String>) {
        let pause = Duration::from_millis(config.inter_record_delay_ms);
        let mut acknowledged = Vec::with_capacity(batch.len());
        let mut consecutive_failures = 0;
        let mut last_error = None;

        for (index, reading) in batch.iter().enumerate() {
            if index > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            match self.hub.submit_reading(reading).await {
                Ok(()) => {
                    consecutive_failures = 0;
                    acknowledged.push(reading.clone());
                }
                Err(e) => {
                    warn!(
                        "Failed to submit {} reading from {}: {}",
                        reading.sensor_type, reading.timestamp, e
                    );
                    last_error = Some(e.to_string());
                    consecutive_failures += 1;
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        warn!(
                            "Aborting batch after {} consecutive failures",
                            consecutive_failures
                        );
                        break;
                    }
                }
            }
        }

        (acknowledged, last_error)
    }

    fn finish_batch<S: ReadingStore>(
        &mut self,
        store: &mut S,
        config: &StorageConfig,
        result: SyncResult,
        marked: usize,
    ) {
        let now = self.clock.now_ms();
        info!(
            "Batch result: {} synced, {} failed ({:?})",
            result.synced_count, result.failed_count, result.outcome
        );

        if result.made_progress() {
            if let Err(e) = store.record_sync_success(marked, self.clock.now_utc()) {
                warn!("Failed to persist sync status: {}", e);
            }
            self.last_scheduled_sync_ms = now;
        }

        match result.outcome {
            SyncOutcome::Complete => {
                self.retry_count = 0;
                self.current_retry_delay = Duration::ZERO;
                self.next_retry_at_ms = 0;
                if store.pending_count() > 0 && self.link.is_connected() {
                    debug!("{} readings still pending, continuing", store.pending_count());
                } else {
                    self.set_state(SyncState::Idle);
                }
            }
            SyncOutcome::Partial => {
                // Progress was made, so the budget restarts before this
                // attempt is counted.
                self.retry_count = 0;
                self.schedule_retry(store, config, &result, now);
            }
            SyncOutcome::Failed => {
                self.schedule_retry(store, config, &result, now);
            }
        }

        self.emit(SyncEvent::BatchCompleted {
            result: result.clone(),
        });
        self.last_result = Some(result);
    }

    fn schedule_retry<S: ReadingStore>(
        &mut self,
        store: &mut S,
        config: &StorageConfig,
        result: &SyncResult,
        now: u64,
    ) {
        let retry = config.retry();
        let delay = retry.delay_for_attempt(self.retry_count);
        self.retry_count = self.retry_count.saturating_add(1);
        self.current_retry_delay = delay;
        self.next_retry_at_ms = now.saturating_add(duration_ms(delay));

        let message = result.error.as_deref().unwrap_or("sync failed");
        if let Err(e) = store.record_sync_failure(message) {
            warn!("Failed to persist sync status: {}", e);
        }

        if retry.is_exhausted(self.retry_count) {
            error!(
                "Sync failed {} times, giving up until conditions change: {}",
                self.retry_count, message
            );
            self.emit(SyncEvent::RetriesExhausted {
                attempts: self.retry_count,
            });
            self.set_state(SyncState::Error);
        } else {
            warn!(
                "Sync attempt {} failed, retrying in {:?}: {}",
                self.retry_count, delay, message
            );
            self.set_state(SyncState::Waiting);
        }

        self.emit(SyncEvent::RetryScheduled {
            attempt: self.retry_count,
            delay_ms: duration_ms(delay),
            at_ms: self.next_retry_at_ms,
        });
    }
}

/// Persist the acknowledged readings as synced.
///
/// Returns the batch result and the number of records actually flipped. A
/// batch whose acknowledgments could not be persisted counts as failed: the
/// readings stay pending and are re-sent after the backoff.
fn mark_acknowledged<S: ReadingStore>(
    store: &mut S,
    batch: &[StoredReading],
    (acknowledged, last_error): (Vec<StoredReading>, Option<String>),
) -> (SyncResult, usize) {
    let mut marked = 0;
    if !acknowledged.is_empty() {
        match store.mark_synced(&acknowledged) {
            Ok(count) => {
                if count < acknowledged.len() {
                    debug!(
                        "{} acknowledged readings were already marked",
                        acknowledged.len() - count
                    );
                }
                marked = count;
            }
            Err(e) => {
                error!("Failed to mark {} readings synced: {}", acknowledged.len(), e);
                return (
                    SyncResult::failed(
                        batch.len(),
                        format!("Failed to mark readings synced: {e}"),
                    ),
                    0,
                );
            }
        }
    }

    let synced_count = acknowledged.len();
    let failed_count = batch.len() - synced_count;
    let outcome = match (synced_count, failed_count) {
        (_, 0) => SyncOutcome::Complete,
        (0, _) => SyncOutcome::Failed,
        _ => SyncOutcome::Partial,
    };

    let result = SyncResult {
        outcome,
        synced_count,
        failed_count,
        error: if failed_count > 0 { last_error } else { None },
    };
    (result, marked)
}

fn probe_ms() -> u64 {
    duration_ms(LINK_PROBE_INTERVAL)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
