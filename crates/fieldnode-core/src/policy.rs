//! Routing decisions for incoming readings.

use fieldnode_types::StorageMode;
use serde::{Deserialize, Serialize};

/// Maps a [`StorageMode`] (and connectivity) to where a reading goes.
///
/// | Mode | Store locally | Send immediately | Autosync |
/// |------|---------------|------------------|----------|
/// | `REMOTE_ONLY` | no | when connected | no |
/// | `LOCAL_AND_REMOTE` | yes | when connected | no |
/// | `LOCAL_ONLY` | yes | never | no |
/// | `LOCAL_AUTOSYNC` | yes | never | yes |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePolicy {
    mode: StorageMode,
}

impl StoragePolicy {
    pub fn new(mode: StorageMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    pub fn should_store_locally(&self) -> bool {
        matches!(
            self.mode,
            StorageMode::LocalOnly | StorageMode::LocalAndRemote | StorageMode::LocalAutosync
        )
    }

    pub fn should_send_remote_immediately(&self, connected: bool) -> bool {
        connected && matches!(self.mode, StorageMode::RemoteOnly | StorageMode::LocalAndRemote)
    }

    pub fn is_autosync(&self) -> bool {
        self.mode == StorageMode::LocalAutosync
    }

    /// Whether the sync engine may push stored readings at all.
    pub fn is_remote_sync_enabled(&self) -> bool {
        self.mode != StorageMode::LocalOnly
    }
}

impl From<StorageMode> for StoragePolicy {
    fn from(mode: StorageMode) -> Self {
        Self::new(mode)
    }
}
