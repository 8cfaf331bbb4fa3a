//! Main store implementation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use fieldnode_types::{PartitionDate, ReadingKey, StoredReading};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::{Error, Result};
use crate::partition::{
    self, DATA_EXTENSION, MARKER_EXTENSION, PartitionFiles, PartitionInfo, PartitionLine,
    TEMP_EXTENSION,
};
use crate::status::SyncStatus;

/// Directory under the media root holding partition files.
pub const READINGS_DIR: &str = "readings";
/// Persisted sync aggregate, relative to the media root.
pub const STATUS_FILE: &str = "sync_status.json";

/// Media sizing for a [`Store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Total size of the media in bytes.
    pub capacity_bytes: u64,
    /// Free space an append may never eat into.
    pub reserved_bytes: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            capacity_bytes: 64 * 1024 * 1024,
            reserved_bytes: 64 * 1024,
        }
    }
}

/// Space accounting for the media, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceInfo {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// Day-partitioned reading log on a media root.
///
/// Layout:
///
/// ```text
/// <root>/readings/YYYYMMDD.csv      one partition per day
/// <root>/readings/YYYYMMDD.synced   marker for fully synced partitions
/// <root>/sync_status.json           persisted aggregate
/// ```
pub struct Store {
    root: PathBuf,
    readings_dir: PathBuf,
    options: StoreOptions,
    status: SyncStatus,
    newest: Option<PartitionDate>,
}

impl Store {
    /// Open the store on an existing media root, recovering from any
    /// interrupted writes.
    pub fn open<P: AsRef<Path>>(root: P, options: StoreOptions) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(Error::NoMedia(root));
        }

        let readings_dir = root.join(READINGS_DIR);
        if !readings_dir.exists() {
            fs::create_dir_all(&readings_dir).map_err(|e| Error::CreateDirectory {
                path: readings_dir.clone(),
                source: e,
            })?;
        }

        info!("Opening reading store at {}", root.display());

        let mut store = Self {
            status: SyncStatus::load(&root.join(STATUS_FILE)),
            root,
            readings_dir,
            options,
            newest: None,
        };
        store.recover()?;
        store.rebuild_status()?;
        Ok(store)
    }

    /// Open the store in the platform data directory, creating it if needed.
    pub fn open_default() -> Result<Self> {
        let root = crate::default_media_root();
        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| Error::CreateDirectory {
                path: root.clone(),
                source: e,
            })?;
        }
        Self::open(root, StoreOptions::default())
    }

    /// Media root this store lives on.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    fn ensure_media(&self) -> Result<()> {
        if self.readings_dir.is_dir() {
            Ok(())
        } else {
            Err(Error::NoMedia(self.root.clone()))
        }
    }

    fn files(&self, date: PartitionDate) -> PartitionFiles {
        PartitionFiles::new(&self.readings_dir, date)
    }

    fn status_path(&self) -> PathBuf {
        self.root.join(STATUS_FILE)
    }

    /// Remove leftovers of interrupted writes.
    fn recover(&mut self) -> Result<()> {
        for entry in fs::read_dir(&self.readings_dir)? {
            let path = entry?.path();
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

            if extension == TEMP_EXTENSION {
                warn!("Removing stale temp file {}", path.display());
                fs::remove_file(&path)?;
            } else if extension == MARKER_EXTENSION && !path.with_extension(DATA_EXTENSION).exists() {
                warn!("Removing orphan marker {}", path.display());
                fs::remove_file(&path)?;
            }
        }

        for date in partition::scan_dates(&self.readings_dir)? {
            let files = self.files(date);
            let dropped = files.truncate_torn_tail()?;
            if dropped > 0 {
                warn!("Truncated {} bytes of torn tail from partition {}", dropped, date);
            }
            if files.byte_size() == 0 {
                fs::remove_file(&files.data)?;
                files.set_marker(false)?;
            }
        }

        let stale_status = self.status_path().with_extension("json.tmp");
        if stale_status.exists() {
            fs::remove_file(stale_status)?;
        }
        Ok(())
    }

    /// Recount totals by scanning every partition, repair synced markers and
    /// persist the result.
    pub fn rebuild_status(&mut self) -> Result<SyncStatus> {
        self.ensure_media()?;

        let mut total = 0u64;
        let mut synced = 0u64;
        let mut last_timestamp: Option<u64> = None;
        let dates = partition::scan_dates(&self.readings_dir)?;

        for &date in &dates {
            let files = self.files(date);
            let lines = files.read_lines()?;
            let records: Vec<&StoredReading> = lines
                .iter()
                .filter_map(|line| match line {
                    PartitionLine::Record(record) => Some(record),
                    PartitionLine::Undecodable(_) => None,
                })
                .collect();
            let partition_synced = records.iter().filter(|r| r.synced).count() as u64;

            total += records.len() as u64;
            synced += partition_synced;
            if let Some(max) = records.iter().map(|r| r.timestamp).max() {
                last_timestamp = Some(last_timestamp.map_or(max, |t| t.max(max)));
            }

            let fully_synced = partition::all_synced(&lines);
            if fully_synced != files.is_marked_synced() {
                debug!("Repairing synced marker for partition {}", date);
                files.set_marker(fully_synced)?;
            }
        }

        self.newest = dates.last().copied();
        self.status.set_counts(total, synced);
        self.status.last_reading_timestamp = last_timestamp;
        self.persist_status()?;

        debug!(
            "Rebuilt sync status: {} total, {} synced across {} partitions",
            total,
            synced,
            dates.len()
        );
        Ok(self.status.clone())
    }

    fn persist_status(&self) -> Result<()> {
        self.status.save(&self.status_path())
    }
}

// Record operations
impl Store {
    /// Append a reading to its day partition.
    ///
    /// Readings dated before the newest partition go into the newest
    /// partition so that closed days are never appended to.
    pub fn append(&mut self, reading: &StoredReading) -> Result<PartitionDate> {
        self.ensure_media()?;

        let line = codec::encode(reading)?;
        let needed = line.len() as u64;
        let free = self.space_accounting()?.free;
        if free < needed.saturating_add(self.options.reserved_bytes) {
            return Err(Error::OutOfSpace {
                needed,
                free,
                reserved: self.options.reserved_bytes,
            });
        }

        let reading_date = reading
            .date()
            .map_err(|e| Error::InvalidRecord(e.to_string()))?;
        let date = match self.newest {
            Some(newest) if reading_date < newest => newest,
            _ => reading_date,
        };

        let files = self.files(date);
        if reading.synced {
            // A new partition holding only acknowledged readings is fully
            // synced; an existing one keeps whatever marker it has.
            let is_new = !files.data.exists();
            files.append_line(&line)?;
            if is_new {
                files.set_marker(true)?;
            }
        } else {
            files.set_marker(false)?;
            files.append_line(&line)?;
        }

        self.newest = Some(date);
        self.status.add_appended(reading.timestamp);
        if reading.synced {
            self.status.add_synced(1);
        }
        Ok(date)
    }

    /// Up to `max_count` unsynced readings, oldest partition first, in
    /// append order within a partition.
    pub fn pending(&self, max_count: usize) -> Result<Vec<StoredReading>> {
        self.ensure_media()?;

        let mut pending = Vec::new();
        if max_count == 0 {
            return Ok(pending);
        }

        for date in partition::scan_dates(&self.readings_dir)? {
            let files = self.files(date);
            if files.is_marked_synced() {
                continue;
            }
            for record in files.read_all()? {
                if !record.synced {
                    pending.push(record);
                    if pending.len() >= max_count {
                        return Ok(pending);
                    }
                }
            }
        }
        Ok(pending)
    }

    /// Flip `synced` on exactly the given readings, matched by identity.
    ///
    /// Readings that are already synced or not on the media are skipped.
    /// Returns the number of records actually flipped.
    pub fn mark_synced(&mut self, readings: &[StoredReading]) -> Result<usize> {
        self.ensure_media()?;

        let mut wanted: HashMap<ReadingKey, usize> = HashMap::new();
        for reading in readings {
            *wanted.entry(reading.key()).or_default() += 1;
        }

        let mut flipped_total = 0usize;
        for date in partition::scan_dates(&self.readings_dir)? {
            if wanted.is_empty() {
                break;
            }
            let files = self.files(date);
            if files.is_marked_synced() {
                continue;
            }

            let mut lines = files.read_lines()?;
            let mut flipped = 0usize;
            let unsynced = lines.iter_mut().filter_map(|line| match line {
                PartitionLine::Record(record) if !record.synced => Some(record),
                _ => None,
            });
            for record in unsynced {
                let key = record.key();
                if let Some(count) = wanted.get_mut(&key) {
                    record.synced = true;
                    flipped += 1;
                    *count -= 1;
                    if *count == 0 {
                        wanted.remove(&key);
                    }
                }
            }

            if flipped > 0 {
                files.rewrite(&lines)?;
                if partition::all_synced(&lines) {
                    files.set_marker(true)?;
                }
                flipped_total += flipped;
            }
        }

        if flipped_total > 0 {
            self.status.add_synced(flipped_total as u64);
            self.persist_status()?;
        }
        if flipped_total < readings.len() {
            debug!(
                "Marked {} of {} readings synced; the rest were already synced or missing",
                flipped_total,
                readings.len()
            );
        }
        Ok(flipped_total)
    }

    /// All records of one partition, in append order.
    pub fn readings_for(&self, date: PartitionDate) -> Result<Vec<StoredReading>> {
        self.ensure_media()?;
        let files = self.files(date);
        if !files.data.exists() {
            return Err(Error::PartitionNotFound(date));
        }
        files.read_all()
    }

    pub fn pending_count(&self) -> u64 {
        self.status.pending_readings
    }

    pub fn has_pending(&self) -> bool {
        self.status.pending_readings > 0
    }
}

// Partition and space operations
impl Store {
    /// All partitions, oldest first.
    pub fn list_partitions(&self) -> Result<Vec<PartitionInfo>> {
        self.ensure_media()?;
        partition::scan_dates(&self.readings_dir)?
            .into_iter()
            .map(|date| {
                let files = self.files(date);
                Ok(PartitionInfo {
                    date,
                    byte_size: files.byte_size(),
                    fully_synced: files.is_marked_synced(),
                })
            })
            .collect()
    }

    /// Delete a partition. Only fully synced partitions can be deleted.
    pub fn delete_partition(&mut self, date: PartitionDate) -> Result<u64> {
        self.ensure_media()?;
        let files = self.files(date);
        if !files.data.exists() {
            return Err(Error::PartitionNotFound(date));
        }

        let lines = files.read_lines()?;
        if !files.is_marked_synced() || !partition::all_synced(&lines) {
            return Err(Error::NotSynced(date));
        }

        let freed = files.byte_size();
        fs::remove_file(&files.data)?;
        files.set_marker(false)?;

        self.status.remove_synced(lines.len() as u64);
        if self.newest == Some(date) {
            self.newest = partition::scan_dates(&self.readings_dir)?.last().copied();
        }
        self.persist_status()?;

        info!("Deleted synced partition {} ({} bytes)", date, freed);
        Ok(freed)
    }

    /// Capacity, bytes used by files on the media, and what is left.
    pub fn space_accounting(&self) -> Result<SpaceInfo> {
        self.ensure_media()?;
        let used = dir_size(&self.root)? + dir_size(&self.readings_dir)?;
        Ok(SpaceInfo {
            total: self.options.capacity_bytes,
            used,
            free: self.options.capacity_bytes.saturating_sub(used),
        })
    }
}

// Sync bookkeeping
impl Store {
    /// Snapshot of the aggregate.
    pub fn sync_status(&self) -> &SyncStatus {
        &self.status
    }

    /// Record a successful sync that delivered `count` readings.
    pub fn record_sync_success(&mut self, count: usize, at: OffsetDateTime) -> Result<()> {
        self.status.last_sync_at = Some(at);
        self.status.last_sync_count = count as u64;
        self.status.consecutive_failures = 0;
        self.status.last_error = None;
        self.persist_status()
    }

    /// Record a failed sync attempt.
    pub fn record_sync_failure(&mut self, error: &str) -> Result<()> {
        self.status.consecutive_failures = self.status.consecutive_failures.saturating_add(1);
        self.status.last_error = Some(error.to_string());
        self.persist_status()
    }
}

/// Sum of regular file sizes directly inside `dir`.
fn dir_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let metadata = entry?.metadata()?;
        if metadata.is_file() {
            total += metadata.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2026-10-19T00:00:00Z
    const DAY: u64 = 1_792_368_000;
    const SECONDS_PER_DAY: u64 = 86_400;

    fn open(dir: &Path) -> Store {
        Store::open(dir, StoreOptions::default()).unwrap()
    }

    fn reading(timestamp: u64) -> StoredReading {
        StoredReading::new(timestamp, "temperature", 21.5, "C", 3)
    }

    #[test]
    fn test_open_missing_media() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("card");
        let result = Store::open(&missing, StoreOptions::default());
        assert!(matches!(result, Err(Error::NoMedia(path)) if path == missing));
    }

    #[test]
    fn test_append_and_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());

        let date = store.append(&reading(DAY + 10)).unwrap();
        store.append(&reading(DAY + 20)).unwrap();
        assert_eq!(date.to_string(), "20261019");

        let pending = store.pending(10).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].timestamp, DAY + 10);
        assert_eq!(store.pending_count(), 2);
        assert!(store.has_pending());
        assert!(dir.path().join("readings/20261019.csv").exists());
    }

    #[test]
    fn test_pending_orders_partitions_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());

        store.append(&reading(DAY)).unwrap();
        store.append(&reading(DAY + 1)).unwrap();
        store.append(&reading(DAY + SECONDS_PER_DAY)).unwrap();

        let pending = store.pending(2).unwrap();
        assert_eq!(
            pending.iter().map(|r| r.timestamp).collect::<Vec<_>>(),
            [DAY, DAY + 1]
        );
        assert!(store.pending(0).unwrap().is_empty());
        assert_eq!(store.pending(usize::MAX).unwrap().len(), 3);
    }

    #[test]
    fn test_late_reading_goes_to_newest_partition() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());

        store.append(&reading(DAY + SECONDS_PER_DAY)).unwrap();
        let date = store.append(&reading(DAY)).unwrap();
        assert_eq!(date.to_string(), "20261020");
        assert_eq!(store.list_partitions().unwrap().len(), 1);
    }

    #[test]
    fn test_mark_synced_flips_exactly_given_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        for i in 0..4 {
            store.append(&reading(DAY + i)).unwrap();
        }

        let pending = store.pending(10).unwrap();
        let chosen = [pending[0].clone(), pending[2].clone()];
        assert_eq!(store.mark_synced(&chosen).unwrap(), 2);

        let remaining: Vec<u64> = store.pending(10).unwrap().iter().map(|r| r.timestamp).collect();
        assert_eq!(remaining, [DAY + 1, DAY + 3]);
        assert_eq!(store.sync_status().synced_readings, 2);
        assert_eq!(store.pending_count(), 2);
    }

    #[test]
    fn test_mark_synced_skips_already_synced_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        store.append(&reading(DAY)).unwrap();

        let pending = store.pending(10).unwrap();
        assert_eq!(store.mark_synced(&pending).unwrap(), 1);
        assert_eq!(store.mark_synced(&pending).unwrap(), 0);
        assert_eq!(store.mark_synced(&[reading(DAY + 999)]).unwrap(), 0);
        assert_eq!(store.sync_status().synced_readings, 1);
    }

    #[test]
    fn test_mark_synced_treats_duplicates_as_multiset() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        store.append(&reading(DAY)).unwrap();
        store.append(&reading(DAY)).unwrap();

        assert_eq!(store.mark_synced(&[reading(DAY)]).unwrap(), 1);
        assert_eq!(store.pending_count(), 1);
        assert_eq!(store.mark_synced(&[reading(DAY), reading(DAY)]).unwrap(), 1);
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_fully_synced_partition_is_marked() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        store.append(&reading(DAY)).unwrap();
        store.append(&reading(DAY + SECONDS_PER_DAY)).unwrap();

        let first = store.pending(1).unwrap();
        store.mark_synced(&first).unwrap();

        let partitions = store.list_partitions().unwrap();
        assert!(partitions[0].fully_synced);
        assert!(!partitions[1].fully_synced);
        assert!(partitions[0].byte_size > 0);
    }

    #[test]
    fn test_append_clears_synced_marker() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        store.append(&reading(DAY)).unwrap();
        let pending = store.pending(10).unwrap();
        store.mark_synced(&pending).unwrap();
        assert!(store.list_partitions().unwrap()[0].fully_synced);

        store.append(&reading(DAY + 5)).unwrap();
        assert!(!store.list_partitions().unwrap()[0].fully_synced);
        assert_eq!(store.pending(10).unwrap().len(), 1);
    }

    #[test]
    fn test_append_of_delivered_readings_keeps_partition_synced() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        for i in 0..3 {
            let mut delivered = reading(DAY + i);
            delivered.synced = true;
            store.append(&delivered).unwrap();
        }

        let partitions = store.list_partitions().unwrap();
        assert!(partitions[0].fully_synced);
        assert_eq!(store.pending_count(), 0);

        let date: PartitionDate = "20261019".parse().unwrap();
        assert!(store.delete_partition(date).unwrap() > 0);
    }

    #[test]
    fn test_delivered_reading_does_not_mark_partition_with_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        store.append(&reading(DAY)).unwrap();
        let mut delivered = reading(DAY + 1);
        delivered.synced = true;
        store.append(&delivered).unwrap();

        assert!(!store.list_partitions().unwrap()[0].fully_synced);
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn test_undecodable_line_survives_mark_synced() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        store.append(&reading(DAY)).unwrap();
        let data = dir.path().join("readings/20261019.csv");
        let mut content = fs::read_to_string(&data).unwrap();
        content.push_str("garbled,line\n");
        fs::write(&data, content).unwrap();

        let pending = store.pending(10).unwrap();
        assert_eq!(store.mark_synced(&pending).unwrap(), 1);

        assert!(fs::read_to_string(&data).unwrap().contains("garbled,line\n"));
        assert!(!store.list_partitions().unwrap()[0].fully_synced);
        let date: PartitionDate = "20261019".parse().unwrap();
        assert!(matches!(store.delete_partition(date), Err(Error::NotSynced(_))));

        drop(store);
        let store = open(dir.path());
        assert!(!store.list_partitions().unwrap()[0].fully_synced);
    }

    #[test]
    fn test_delete_partition_requires_synced() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        store.append(&reading(DAY)).unwrap();
        let date: PartitionDate = "20261019".parse().unwrap();

        assert!(matches!(store.delete_partition(date), Err(Error::NotSynced(d)) if d == date));
        assert_eq!(store.pending_count(), 1);

        let pending = store.pending(10).unwrap();
        store.mark_synced(&pending).unwrap();
        let freed = store.delete_partition(date).unwrap();
        assert!(freed > 0);
        assert!(store.list_partitions().unwrap().is_empty());
        assert_eq!(store.sync_status().total_readings, 0);

        assert!(matches!(
            store.delete_partition(date),
            Err(Error::PartitionNotFound(_))
        ));
    }

    #[test]
    fn test_out_of_space() {
        let dir = tempfile::tempdir().unwrap();
        let options = StoreOptions {
            capacity_bytes: 8192,
            reserved_bytes: 4096,
        };
        let mut store = Store::open(dir.path(), options).unwrap();

        let mut appended = 0;
        let err = loop {
            match store.append(&reading(DAY + appended)) {
                Ok(_) => appended += 1,
                Err(e) => break e,
            }
            assert!(appended < 1000, "capacity never enforced");
        };
        assert!(matches!(err, Error::OutOfSpace { .. }));
        assert!(appended > 0);
        assert_eq!(store.pending_count(), appended);
        assert!(store.space_accounting().unwrap().free >= 4096);
    }

    #[test]
    fn test_space_accounting() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        let before = store.space_accounting().unwrap();
        store.append(&reading(DAY)).unwrap();
        let after = store.space_accounting().unwrap();

        assert_eq!(after.total, StoreOptions::default().capacity_bytes);
        assert!(after.used > before.used);
        assert_eq!(after.free, after.total - after.used);
    }

    #[test]
    fn test_reopen_recovers_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = open(dir.path());
            store.append(&reading(DAY)).unwrap();
            store.append(&reading(DAY + 1)).unwrap();
        }

        let path = dir.path().join("readings/20261019.csv");
        let mut content = fs::read(&path).unwrap();
        content.extend_from_slice(b"1792368002,temper");
        fs::write(&path, content).unwrap();
        fs::write(dir.path().join("readings/20261019.csv.tmp"), "partial").unwrap();

        let store = open(dir.path());
        let pending = store.pending(10).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(store.pending_count(), 2);
        assert!(!dir.path().join("readings/20261019.csv.tmp").exists());
    }

    #[test]
    fn test_reopen_keeps_failure_bookkeeping() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = open(dir.path());
            store.append(&reading(DAY)).unwrap();
            store.record_sync_failure("hub unreachable").unwrap();
            store.record_sync_failure("hub unreachable").unwrap();
        }

        let mut store = open(dir.path());
        assert_eq!(store.sync_status().consecutive_failures, 2);
        assert_eq!(store.sync_status().last_error.as_deref(), Some("hub unreachable"));
        assert_eq!(store.sync_status().total_readings, 1);

        let at = OffsetDateTime::from_unix_timestamp(DAY as i64).unwrap();
        store.record_sync_success(1, at).unwrap();
        assert_eq!(store.sync_status().consecutive_failures, 0);
        assert!(store.sync_status().last_error.is_none());
        assert_eq!(store.sync_status().last_sync_at, Some(at));
    }

    #[test]
    fn test_reopen_removes_orphan_marker_and_repairs_counts() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = open(dir.path());
            store.append(&reading(DAY)).unwrap();
        }
        fs::write(dir.path().join("readings/20261001.synced"), "").unwrap();
        fs::write(dir.path().join(STATUS_FILE), "garbage").unwrap();

        let store = open(dir.path());
        assert!(!dir.path().join("readings/20261001.synced").exists());
        assert_eq!(store.sync_status().total_readings, 1);
        assert_eq!(store.sync_status().pending_readings, 1);
    }

    #[test]
    fn test_readings_for() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        store.append(&reading(DAY)).unwrap();

        let date: PartitionDate = "20261019".parse().unwrap();
        assert_eq!(store.readings_for(date).unwrap().len(), 1);
        assert!(matches!(
            store.readings_for(date.days_before(1)),
            Err(Error::PartitionNotFound(_))
        ));
    }

    #[test]
    fn test_rejects_multiline_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        let bad = StoredReading::new(DAY, "temp\nerature", 1.0, "C", 1);
        assert!(matches!(store.append(&bad), Err(Error::InvalidRecord(_))));
        assert_eq!(store.pending_count(), 0);
    }
}
