//! Node event queue.
//!
//! Instead of registering callbacks, the caller drains the queue once per
//! scheduler pass (for the status LED, logs or a UI). The queue is bounded;
//! when full, the oldest event is discarded.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use fieldnode_types::{PartitionDate, SyncState};

use crate::sync::SyncResult;

/// Default number of events retained between drains.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Events emitted by the node and its sync engine.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SyncEvent {
    /// Engine state changed.
    StateChanged { from: SyncState, to: SyncState },
    /// A sync was requested explicitly or by a link coming up.
    SyncTriggered {
        reason: TriggerReason,
        force_all: bool,
    },
    /// A batch is about to be submitted.
    BatchStarted { size: usize },
    /// A batch finished.
    BatchCompleted { result: SyncResult },
    /// A failed attempt was scheduled for retry.
    RetryScheduled {
        attempt: u32,
        delay_ms: u64,
        at_ms: u64,
    },
    /// The retry budget is spent; the engine is in the error state.
    RetriesExhausted { attempts: u32 },
    /// Connectivity went up or down.
    LinkChanged { connected: bool },
    /// A reading could not be stored and is lost.
    ReadingDropped { sensor_type: String, error: String },
    /// Synced partitions were deleted.
    SpaceReclaimed {
        deleted: Vec<PartitionDate>,
        bytes_freed: u64,
        shortfall: u64,
    },
}

/// Why a sync was triggered outside the normal strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// Explicit request (button, command).
    Manual,
    /// Connectivity came back with pending readings.
    LinkRestored,
}

/// Bounded FIFO of [`SyncEvent`]s.
#[derive(Debug, Clone)]
pub struct EventQueue {
    events: VecDeque<SyncEvent>,
    capacity: usize,
    discarded: u64,
}

impl EventQueue {
    /// Create a queue holding at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            discarded: 0,
        }
    }

    pub fn push(&mut self, event: SyncEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.discarded += 1;
        }
        self.events.push_back(event);
    }

    /// Take every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<SyncEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events dropped because the queue was full.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_drops_oldest_when_full() {
        let mut queue = EventQueue::new(2);
        for size in 1..=3 {
            queue.push(SyncEvent::BatchStarted { size });
        }
        assert_eq!(queue.discarded(), 1);
        assert_eq!(
            queue.drain(),
            [
                SyncEvent::BatchStarted { size: 2 },
                SyncEvent::BatchStarted { size: 3 }
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let event = SyncEvent::StateChanged {
            from: SyncState::Idle,
            to: SyncState::Syncing,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"state_changed","from":"IDLE","to":"SYNCING"}"#);

        let event = SyncEvent::SyncTriggered {
            reason: TriggerReason::LinkRestored,
            force_all: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""reason":"link_restored""#));
    }
}
