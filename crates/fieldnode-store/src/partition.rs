//! Day partition files and their on-media naming.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use fieldnode_types::{PartitionDate, StoredReading};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec;
use crate::error::Result;

pub(crate) const DATA_EXTENSION: &str = "csv";
pub(crate) const MARKER_EXTENSION: &str = "synced";
pub(crate) const TEMP_EXTENSION: &str = "tmp";

/// Summary of one day partition as listed on the media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// Calendar day of the partition.
    pub date: PartitionDate,
    /// Size of the partition file in bytes.
    pub byte_size: u64,
    /// Every record in the partition has been acknowledged by the Hub.
    pub fully_synced: bool,
}

/// One line of a partition file.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PartitionLine {
    Record(StoredReading),
    /// A complete line that does not decode. It is never confirmed synced.
    Undecodable(String),
}

impl PartitionLine {
    pub fn is_synced(&self) -> bool {
        matches!(self, PartitionLine::Record(record) if record.synced)
    }
}

/// True when the partition has lines and the Hub acknowledged all of them.
pub(crate) fn all_synced(lines: &[PartitionLine]) -> bool {
    !lines.is_empty() && lines.iter().all(PartitionLine::is_synced)
}

/// Paths belonging to one partition.
#[derive(Debug, Clone)]
pub(crate) struct PartitionFiles {
    pub date: PartitionDate,
    pub data: PathBuf,
    pub marker: PathBuf,
    pub temp: PathBuf,
}

impl PartitionFiles {
    pub fn new(dir: &Path, date: PartitionDate) -> Self {
        let stem = date.to_string();
        Self {
            date,
            data: dir.join(format!("{stem}.{DATA_EXTENSION}")),
            marker: dir.join(format!("{stem}.{MARKER_EXTENSION}")),
            temp: dir.join(format!("{stem}.{DATA_EXTENSION}.{TEMP_EXTENSION}")),
        }
    }

    pub fn is_marked_synced(&self) -> bool {
        self.marker.exists()
    }

    /// Decode every record, skipping lines that fail to decode.
    pub fn read_all(&self) -> Result<Vec<StoredReading>> {
        Ok(self
            .read_lines()?
            .into_iter()
            .filter_map(|line| match line {
                PartitionLine::Record(record) => Some(record),
                PartitionLine::Undecodable(_) => None,
            })
            .collect())
    }

    /// Every non-empty line in append order. Lines that fail to decode are
    /// kept verbatim so a rewrite never drops them.
    pub fn read_lines(&self) -> Result<Vec<PartitionLine>> {
        let content = fs::read(&self.data)?;
        let text = String::from_utf8_lossy(&content);
        let mut lines = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            match codec::decode(line) {
                Ok(record) => lines.push(PartitionLine::Record(record)),
                Err(e) => {
                    warn!(
                        "Undecodable line {} in {}: {}",
                        index + 1,
                        self.data.display(),
                        e
                    );
                    lines.push(PartitionLine::Undecodable(line.to_string()));
                }
            }
        }
        Ok(lines)
    }

    /// Append one encoded line and flush it to the media.
    pub fn append_line(&self, line: &[u8]) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.data)?;
        file.write_all(line)?;
        file.sync_data()?;
        Ok(())
    }

    /// Replace the partition contents through a synced temp file and rename.
    pub fn rewrite(&self, lines: &[PartitionLine]) -> Result<()> {
        let mut buffer = Vec::with_capacity(lines.len() * 48);
        for line in lines {
            match line {
                PartitionLine::Record(record) => buffer.extend_from_slice(&codec::encode(record)?),
                PartitionLine::Undecodable(raw) => {
                    buffer.extend_from_slice(raw.as_bytes());
                    buffer.push(b'\n');
                }
            }
        }

        let mut file = fs::File::create(&self.temp)?;
        file.write_all(&buffer)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.temp, &self.data)?;
        Ok(())
    }

    pub fn set_marker(&self, synced: bool) -> Result<()> {
        match (synced, self.marker.exists()) {
            (true, false) => {
                fs::File::create(&self.marker)?.sync_all()?;
            }
            (false, true) => fs::remove_file(&self.marker)?,
            _ => {}
        }
        Ok(())
    }

    pub fn byte_size(&self) -> u64 {
        fs::metadata(&self.data).map(|m| m.len()).unwrap_or(0)
    }

    /// Truncate anything after the last newline; returns bytes dropped.
    pub fn truncate_torn_tail(&self) -> Result<u64> {
        let content = fs::read(&self.data)?;
        let keep = content
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        let dropped = (content.len() - keep) as u64;
        if dropped > 0 {
            let file = fs::OpenOptions::new().write(true).open(&self.data)?;
            file.set_len(keep as u64)?;
            file.sync_all()?;
        }
        Ok(dropped)
    }
}

/// Dates of all partition data files in `dir`, oldest first.
pub(crate) fn scan_dates(dir: &Path) -> Result<Vec<PartitionDate>> {
    let mut dates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(DATA_EXTENSION) {
            continue;
        }
        if let Some(date) = date_from_stem(&path) {
            dates.push(date);
        }
    }
    dates.sort();
    Ok(dates)
}

pub(crate) fn date_from_stem(path: &Path) -> Option<PartitionDate> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(dir: &Path) -> PartitionFiles {
        PartitionFiles::new(dir, "20261019".parse().unwrap())
    }

    #[test]
    fn test_partition_file_names() {
        let files = files(Path::new("/media/readings"));
        assert_eq!(files.data, Path::new("/media/readings/20261019.csv"));
        assert_eq!(files.marker, Path::new("/media/readings/20261019.synced"));
        assert_eq!(files.temp, Path::new("/media/readings/20261019.csv.tmp"));
    }

    #[test]
    fn test_append_and_read_all() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path());

        for i in 0..3 {
            let reading = StoredReading::new(100 + i, "temperature", 20.0, "C", 1);
            files.append_line(&codec::encode(&reading).unwrap()).unwrap();
        }

        let records = files.read_all().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].timestamp, 102);
    }

    #[test]
    fn test_read_all_skips_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path());
        fs::write(&files.data, "1,co2,800,ppm,1,0\nnot a record\n2,co2,810,ppm,1,1\n").unwrap();

        let records = files.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[1].synced);
    }

    #[test]
    fn test_rewrite_keeps_undecodable_lines() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path());
        fs::write(&files.data, "1,co2,800,ppm,1,0\n2,c\u{1}o2,8x0\n").unwrap();

        let mut lines = files.read_lines().unwrap();
        assert_eq!(lines.len(), 2);
        if let PartitionLine::Record(record) = &mut lines[0] {
            record.synced = true;
        }
        assert!(!all_synced(&lines));
        files.rewrite(&lines).unwrap();

        assert_eq!(
            fs::read_to_string(&files.data).unwrap(),
            "1,co2,800,ppm,1,1\n2,c\u{1}o2,8x0\n"
        );
    }

    #[test]
    fn test_truncate_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path());
        fs::write(&files.data, "1,co2,800,ppm,1,0\n2,co2,8").unwrap();

        assert_eq!(files.truncate_torn_tail().unwrap(), 7);
        assert_eq!(fs::read_to_string(&files.data).unwrap(), "1,co2,800,ppm,1,0\n");
        assert_eq!(files.truncate_torn_tail().unwrap(), 0);
    }

    #[test]
    fn test_rewrite_replaces_contents_and_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path());
        fs::write(&files.data, "1,co2,800,ppm,1,0\n").unwrap();

        let mut record = StoredReading::new(1, "co2", 800.0, "ppm", 1);
        record.synced = true;
        files.rewrite(&[PartitionLine::Record(record)]).unwrap();

        assert_eq!(fs::read_to_string(&files.data).unwrap(), "1,co2,800,ppm,1,1\n");
        assert!(!files.temp.exists());
    }

    #[test]
    fn test_scan_dates_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("20261002.csv"), "").unwrap();
        fs::write(dir.path().join("20260930.csv"), "").unwrap();
        fs::write(dir.path().join("20261002.synced"), "").unwrap();
        fs::write(dir.path().join("notes.csv"), "").unwrap();

        let dates = scan_dates(dir.path()).unwrap();
        let names: Vec<String> = dates.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["20260930", "20261002"]);
    }
}
