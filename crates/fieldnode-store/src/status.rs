//! Persisted sync aggregate.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;

use crate::error::Result;

/// Aggregate counters describing what is on the media and how syncing went.
///
/// Counts are always recomputed from the partitions when the store opens;
/// the timestamps and failure bookkeeping survive restarts through
/// `sync_status.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncStatus {
    /// Records currently on the media.
    pub total_readings: u64,
    /// Records acknowledged by the Hub.
    pub synced_readings: u64,
    /// Records awaiting delivery (`total - synced`).
    pub pending_readings: u64,
    /// When the last successful sync finished.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_sync_at: Option<OffsetDateTime>,
    /// Number of records delivered by the last successful sync.
    pub last_sync_count: u64,
    /// Timestamp (unix seconds) of the newest stored record.
    pub last_reading_timestamp: Option<u64>,
    /// Failed sync attempts since the last success.
    pub consecutive_failures: u32,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
}

impl SyncStatus {
    pub(crate) fn set_counts(&mut self, total: u64, synced: u64) {
        self.total_readings = total;
        self.synced_readings = synced.min(total);
        self.pending_readings = total - self.synced_readings;
    }

    pub(crate) fn add_appended(&mut self, timestamp: u64) {
        self.set_counts(self.total_readings + 1, self.synced_readings);
        self.last_reading_timestamp = Some(
            self.last_reading_timestamp
                .map_or(timestamp, |last| last.max(timestamp)),
        );
    }

    pub(crate) fn add_synced(&mut self, count: u64) {
        self.set_counts(self.total_readings, self.synced_readings + count);
    }

    pub(crate) fn remove_synced(&mut self, count: u64) {
        self.set_counts(
            self.total_readings.saturating_sub(count),
            self.synced_readings.saturating_sub(count),
        );
    }

    /// Load from disk, falling back to defaults when missing or unreadable.
    pub(crate) fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return Self::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Discarding corrupt sync status {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub(crate) fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let temp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp)?;
        file.write_all(&json)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_stay_consistent() {
        let mut status = SyncStatus::default();
        status.add_appended(10);
        status.add_appended(5);
        status.add_appended(12);
        assert_eq!(status.total_readings, 3);
        assert_eq!(status.pending_readings, 3);
        assert_eq!(status.last_reading_timestamp, Some(12));

        status.add_synced(2);
        assert_eq!(status.synced_readings, 2);
        assert_eq!(status.pending_readings, 1);

        status.remove_synced(2);
        assert_eq!(status.total_readings, 1);
        assert_eq!(status.synced_readings, 0);
        assert_eq!(status.pending_readings, 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync_status.json");

        let status = SyncStatus {
            consecutive_failures: 2,
            last_error: Some("timeout".to_string()),
            last_sync_at: Some(OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()),
            ..Default::default()
        };
        status.save(&path).unwrap();

        assert_eq!(SyncStatus::load(&path), status);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_load_corrupt_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync_status.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(SyncStatus::load(&path), SyncStatus::default());

        let missing = dir.path().join("missing.json");
        assert_eq!(SyncStatus::load(&missing), SyncStatus::default());
    }
}
