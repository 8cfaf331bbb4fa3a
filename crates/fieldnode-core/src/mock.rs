//! Mock collaborators for testing.
//!
//! These fakes implement the [`HubClient`], [`Connectivity`] and [`Clock`]
//! traits so the sync engine and [`Node`](crate::Node) can be driven
//! deterministically without a network or a real clock.
//!
//! All mocks are cheap to clone and share their state between clones, so a
//! test keeps one handle while the node owns another.
//!
//! # Features
//!
//! - **Failure injection**: fail every submission from the Nth on, or only
//!   specific attempts
//! - **Latency simulation**: delay each submission
//! - **Manual time**: advance monotonic time and set the wall clock by hand

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use fieldnode_types::StoredReading;

use crate::error::HubError;
use crate::traits::{Clock, Connectivity, HubClient};

const NEVER: usize = usize::MAX;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
struct HubState {
    configured: AtomicBool,
    attempts: AtomicUsize,
    fail_from: AtomicUsize,
    fail_on: Mutex<HashSet<usize>>,
    latency_ms: AtomicU64,
    submitted: Mutex<Vec<StoredReading>>,
}

/// A scriptable Hub.
///
/// Attempts are numbered from 0 across the lifetime of the mock.
///
/// # Example
///
/// ```
/// use fieldnode_core::{HubClient, MockHub};
/// use fieldnode_types::StoredReading;
///
/// #[tokio::main]
/// async fn main() {
///     let hub = MockHub::new();
///     hub.fail_on(&[1]);
///
///     let reading = StoredReading::new(1_700_000_000, "co2", 800.0, "ppm", 1);
///     assert!(hub.submit_reading(&reading).await.is_ok());
///     assert!(hub.submit_reading(&reading).await.is_err());
///     assert_eq!(hub.submitted_count(), 1);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockHub {
    state: Arc<HubState>,
}

impl Default for MockHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHub {
    /// A configured Hub that accepts everything.
    pub fn new() -> Self {
        Self {
            state: Arc::new(HubState {
                configured: AtomicBool::new(true),
                attempts: AtomicUsize::new(0),
                fail_from: AtomicUsize::new(NEVER),
                fail_on: Mutex::new(HashSet::new()),
                latency_ms: AtomicU64::new(0),
                submitted: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn set_configured(&self, configured: bool) {
        self.state.configured.store(configured, Ordering::SeqCst);
    }

    /// Fail every attempt numbered `attempt` or later.
    pub fn fail_from(&self, attempt: usize) {
        self.state.fail_from.store(attempt, Ordering::SeqCst);
    }

    /// Fail only the listed attempts.
    pub fn fail_on(&self, attempts: &[usize]) {
        lock(&self.state.fail_on).extend(attempts.iter().copied());
    }

    /// Accept every further attempt.
    pub fn clear_failures(&self) {
        self.state.fail_from.store(NEVER, Ordering::SeqCst);
        lock(&self.state.fail_on).clear();
    }

    /// Delay each submission by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.state.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Submissions attempted so far, successful or not.
    pub fn attempt_count(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }

    /// Readings acknowledged so far, in submission order.
    pub fn submitted(&self) -> Vec<StoredReading> {
        lock(&self.state.submitted).clone()
    }

    pub fn submitted_count(&self) -> usize {
        lock(&self.state.submitted).len()
    }
}

#[async_trait]
impl HubClient for MockHub {
    async fn submit_reading(&self, reading: &StoredReading) -> Result<(), HubError> {
        let latency = self.state.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let attempt = self.state.attempts.fetch_add(1, Ordering::SeqCst);
        let fails = attempt >= self.state.fail_from.load(Ordering::SeqCst)
            || lock(&self.state.fail_on).contains(&attempt);
        if fails {
            return Err(HubError::Rejected {
                status: 503,
                message: format!("injected failure on attempt {attempt}"),
            });
        }

        lock(&self.state.submitted).push(reading.clone());
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.state.configured.load(Ordering::SeqCst)
    }
}

/// Connectivity switch shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MockLink {
    connected: Arc<AtomicBool>,
}

impl MockLink {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(connected)),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Connectivity for MockLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Hand-driven clock.
///
/// Wall-clock time is `epoch + now_ms`, so advancing the monotonic time also
/// moves the wall clock forward.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
    epoch: Arc<Mutex<OffsetDateTime>>,
}

impl ManualClock {
    /// Clock at `now_ms` with the wall clock starting at the Unix epoch.
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(now_ms)),
            epoch: Arc::new(Mutex::new(OffsetDateTime::UNIX_EPOCH)),
        }
    }

    /// Clock at zero whose wall clock reads `utc`.
    pub fn at(utc: OffsetDateTime) -> Self {
        let clock = Self::new(0);
        clock.set_utc(utc);
        clock
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Make the wall clock read `utc` at the current monotonic time.
    pub fn set_utc(&self, utc: OffsetDateTime) {
        *lock(&self.epoch) = utc - elapsed(self.now_ms());
    }
}

fn elapsed(ms: u64) -> time::Duration {
    time::Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn now_utc(&self) -> OffsetDateTime {
        *lock(&self.epoch) + elapsed(self.now_ms())
    }
}
