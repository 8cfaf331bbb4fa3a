//! Core types for node readings and sync configuration.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{Date, Month, OffsetDateTime};

use crate::error::ParseError;

/// How sensor readings are routed between local storage and the Hub.
///
/// Serialized (and parsed) using the upper-case names, e.g. `"LOCAL_AUTOSYNC"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum StorageMode {
    /// Send directly to the Hub, never store locally.
    RemoteOnly,
    /// Store locally and also send to the Hub when connected.
    LocalAndRemote,
    /// Store locally only, no Hub traffic.
    LocalOnly,
    /// Store locally first, push to the Hub in the background.
    #[default]
    LocalAutosync,
}

impl StorageMode {
    /// All modes, in declaration order.
    pub const ALL: [StorageMode; 4] = [
        StorageMode::RemoteOnly,
        StorageMode::LocalAndRemote,
        StorageMode::LocalOnly,
        StorageMode::LocalAutosync,
    ];

    /// Canonical upper-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::RemoteOnly => "REMOTE_ONLY",
            StorageMode::LocalAndRemote => "LOCAL_AND_REMOTE",
            StorageMode::LocalOnly => "LOCAL_ONLY",
            StorageMode::LocalAutosync => "LOCAL_AUTOSYNC",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageMode {
    type Err = ParseError;

    /// Parse a mode name (case-insensitive).
    ///
    /// ```
    /// use fieldnode_types::StorageMode;
    ///
    /// assert_eq!("local_only".parse(), Ok(StorageMode::LocalOnly));
    /// assert!("sometimes".parse::<StorageMode>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        StorageMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == upper)
            .ok_or_else(|| ParseError::UnknownStorageMode(s.to_string()))
    }
}

/// When automatic sync fires while the engine is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum SyncStrategy {
    /// Sync whenever there is pending data and connectivity.
    #[default]
    Immediate,
    /// Sync once the pending count reaches the batch size.
    Batch,
    /// Sync at a fixed interval.
    Scheduled,
    /// Only sync on an explicit trigger.
    Manual,
}

impl SyncStrategy {
    /// All strategies, in declaration order.
    pub const ALL: [SyncStrategy; 4] = [
        SyncStrategy::Immediate,
        SyncStrategy::Batch,
        SyncStrategy::Scheduled,
        SyncStrategy::Manual,
    ];

    /// Canonical upper-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStrategy::Immediate => "IMMEDIATE",
            SyncStrategy::Batch => "BATCH",
            SyncStrategy::Scheduled => "SCHEDULED",
            SyncStrategy::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStrategy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        SyncStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == upper)
            .ok_or_else(|| ParseError::UnknownSyncStrategy(s.to_string()))
    }
}

/// State of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum SyncState {
    /// Not syncing.
    #[default]
    Idle,
    /// Waiting for connectivity or a retry deadline.
    Waiting,
    /// Submitting batches.
    Syncing,
    /// Retries exhausted; needs connectivity + data or a manual reset.
    Error,
}

impl SyncState {
    /// Human-readable upper-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "IDLE",
            SyncState::Waiting => "WAITING",
            SyncState::Syncing => "SYNCING",
            SyncState::Error => "ERROR",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single sensor observation with its delivery flag.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StoredReading {
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Sensor type code, e.g. `temperature`.
    pub sensor_type: String,
    /// Measured value.
    pub value: f64,
    /// Unit of measurement.
    pub unit: String,
    /// Hub-side sensor assignment.
    pub endpoint_id: i64,
    /// Whether the Hub acknowledged this reading.
    pub synced: bool,
}

impl StoredReading {
    /// Create an unsynced reading.
    pub fn new(
        timestamp: u64,
        sensor_type: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        endpoint_id: i64,
    ) -> Self {
        Self {
            timestamp,
            sensor_type: sensor_type.into(),
            value,
            unit: unit.into(),
            endpoint_id,
            synced: false,
        }
    }

    /// Identity used to match records on disk (there is no surrogate key).
    #[must_use]
    pub fn key(&self) -> ReadingKey {
        ReadingKey {
            timestamp: self.timestamp,
            sensor_type: self.sensor_type.clone(),
            endpoint_id: self.endpoint_id,
        }
    }

    /// Calendar day (UTC) this reading belongs to.
    pub fn date(&self) -> Result<PartitionDate, ParseError> {
        PartitionDate::from_unix(self.timestamp)
    }
}

/// Identity of a reading: timestamp, sensor type and endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReadingKey {
    pub timestamp: u64,
    pub sensor_type: String,
    pub endpoint_id: i64,
}

/// Calendar day identifying one storage partition.
///
/// Formats as `YYYYMMDD`, which also sorts chronologically.
///
/// ```
/// use fieldnode_types::PartitionDate;
///
/// let date: PartitionDate = "20261019".parse().unwrap();
/// assert_eq!(date.to_string(), "20261019");
/// assert_eq!(PartitionDate::from_unix(0).unwrap().to_string(), "19700101");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionDate(Date);

impl PartitionDate {
    /// Wrap a calendar date.
    pub fn new(date: Date) -> Self {
        Self(date)
    }

    /// Build from year, month (1-12) and day.
    pub fn from_ymd(year: i32, month: u8, day: u8) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidPartitionDate(format!("{year:04}{month:02}{day:02}"));
        let month = Month::try_from(month).map_err(|_| invalid())?;
        Date::from_calendar_date(year, month, day)
            .map(Self)
            .map_err(|_| invalid())
    }

    /// UTC day of a unix timestamp.
    pub fn from_unix(timestamp: u64) -> Result<Self, ParseError> {
        i64::try_from(timestamp)
            .ok()
            .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok())
            .map(|dt| Self(dt.date()))
            .ok_or(ParseError::TimestampOutOfRange(timestamp))
    }

    /// UTC day of a wall-clock instant.
    pub fn from_datetime(datetime: OffsetDateTime) -> Self {
        Self(datetime.to_offset(time::UtcOffset::UTC).date())
    }

    /// Underlying calendar date.
    pub fn date(&self) -> Date {
        self.0
    }

    /// The day `days` before this one, saturating at the earliest representable date.
    #[must_use]
    pub fn days_before(&self, days: u32) -> Self {
        Self(
            self.0
                .checked_sub(time::Duration::days(i64::from(days)))
                .unwrap_or(Date::MIN),
        )
    }
}

impl fmt::Display for PartitionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{:02}{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl FromStr for PartitionDate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidPartitionDate(s.to_string());
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = s[0..4].parse().map_err(|_| invalid())?;
        let month: u8 = s[4..6].parse().map_err(|_| invalid())?;
        let day: u8 = s[6..8].parse().map_err(|_| invalid())?;
        Self::from_ymd(year, month, day).map_err(|_| invalid())
    }
}

#[cfg(feature = "serde")]
impl Serialize for PartitionDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for PartitionDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_mode_names() {
        for mode in StorageMode::ALL {
            assert_eq!(mode.as_str().parse::<StorageMode>(), Ok(mode));
        }
        assert_eq!(StorageMode::default(), StorageMode::LocalAutosync);
        assert_eq!(
            "bogus".parse::<StorageMode>(),
            Err(ParseError::UnknownStorageMode("bogus".to_string()))
        );
    }

    #[test]
    fn test_sync_strategy_names() {
        assert_eq!(" batch ".parse(), Ok(SyncStrategy::Batch));
        assert_eq!(SyncStrategy::default(), SyncStrategy::Immediate);
        assert!("hourly".parse::<SyncStrategy>().is_err());
    }

    #[test]
    fn test_sync_state_names() {
        assert_eq!(SyncState::Idle.as_str(), "IDLE");
        assert_eq!(SyncState::Waiting.to_string(), "WAITING");
        assert_eq!(SyncState::Syncing.as_str(), "SYNCING");
        assert_eq!(SyncState::Error.as_str(), "ERROR");
    }

    #[test]
    fn test_serde_uses_upper_case_names() {
        let json = serde_json::to_string(&StorageMode::LocalAndRemote).unwrap();
        assert_eq!(json, "\"LOCAL_AND_REMOTE\"");
        let strategy: SyncStrategy = serde_json::from_str("\"SCHEDULED\"").unwrap();
        assert_eq!(strategy, SyncStrategy::Scheduled);
    }

    #[test]
    fn test_partition_date_rejects_garbage() {
        assert!("2026101".parse::<PartitionDate>().is_err());
        assert!("2026-10-1".parse::<PartitionDate>().is_err());
        assert!("20260230".parse::<PartitionDate>().is_err());
        assert!("20261301".parse::<PartitionDate>().is_err());
    }

    #[test]
    fn test_partition_date_ordering_matches_names() {
        let a: PartitionDate = "20251231".parse().unwrap();
        let b: PartitionDate = "20260101".parse().unwrap();
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
        assert_eq!(b.days_before(1), a);
    }

    #[test]
    fn test_reading_date_and_key() {
        // 2026-10-19T12:00:00Z
        let reading = StoredReading::new(1_792_411_200, "temperature", 21.5, "°C", 7);
        assert_eq!(reading.date().unwrap().to_string(), "20261019");
        let key = reading.key();
        assert_eq!(key.sensor_type, "temperature");
        assert_eq!(key.endpoint_id, 7);
        assert!(!reading.synced);
    }

    #[test]
    fn test_partition_date_serde() {
        let date = PartitionDate::from_ymd(2026, 10, 19).unwrap();
        let json = serde_json::to_string(&date).unwrap();
        assert_eq!(json, "\"20261019\"");
        let back: PartitionDate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, date);
    }
}
