//! Pull-based status snapshot and the indicator pattern derived from it.

use serde::{Deserialize, Serialize};

use fieldnode_store::{SpaceInfo, SyncStatus};
use fieldnode_types::SyncState;

use crate::sync::SyncResult;

/// Pattern shown by the status LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusIndicator {
    /// Everything synced.
    #[default]
    Off,
    /// Readings waiting to be synced.
    SlowBlink,
    /// A sync is running.
    FastBlink,
    /// Retries exhausted.
    DoubleBlink,
    /// Readings pending but no connectivity.
    SolidOn,
    /// Storage media unavailable.
    Alternating,
}

impl StatusIndicator {
    /// Pick the pattern for the current situation; earlier checks win.
    pub fn derive(media_ok: bool, state: SyncState, connected: bool, pending: u64) -> Self {
        if !media_ok {
            Self::Alternating
        } else if state == SyncState::Error {
            Self::DoubleBlink
        } else if state == SyncState::Syncing {
            Self::FastBlink
        } else if pending > 0 && !connected {
            Self::SolidOn
        } else if pending > 0 {
            Self::SlowBlink
        } else {
            Self::Off
        }
    }
}

/// Everything an operator or a display needs to know about the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Space accounting, absent when the media could not be measured.
    pub space: Option<SpaceInfo>,
    /// Why the media could not be measured.
    pub media_error: Option<String>,
    /// Persisted sync aggregate.
    pub sync: SyncStatus,
    pub state: SyncState,
    pub connected: bool,
    pub retry_count: u32,
    /// Monotonic deadline of the next retry, when waiting.
    pub next_retry_at_ms: Option<u64>,
    pub current_retry_delay_ms: u64,
    pub last_result: Option<SyncResult>,
    /// Readings lost because they could not be stored.
    pub dropped_readings: u64,
    /// `None` when the status LED is disabled.
    pub indicator: Option<StatusIndicator>,
}

impl NodeStatus {
    pub fn media_ok(&self) -> bool {
        self.media_error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_priority() {
        use StatusIndicator::*;

        assert_eq!(StatusIndicator::derive(false, SyncState::Error, false, 3), Alternating);
        assert_eq!(StatusIndicator::derive(true, SyncState::Error, true, 3), DoubleBlink);
        assert_eq!(StatusIndicator::derive(true, SyncState::Syncing, true, 3), FastBlink);
        assert_eq!(StatusIndicator::derive(true, SyncState::Waiting, false, 3), SolidOn);
        assert_eq!(StatusIndicator::derive(true, SyncState::Waiting, true, 3), SlowBlink);
        assert_eq!(StatusIndicator::derive(true, SyncState::Idle, false, 0), Off);
    }

    #[test]
    fn test_indicator_serialization() {
        let json = serde_json::to_string(&StatusIndicator::DoubleBlink).unwrap();
        assert_eq!(json, "\"double_blink\"");
    }
}
