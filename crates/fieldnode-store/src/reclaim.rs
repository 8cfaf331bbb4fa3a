//! Space reclamation by deleting fully synced partitions.

use fieldnode_types::PartitionDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::store::Store;

/// Outcome of a reclaim pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimReport {
    /// Partitions deleted, oldest first.
    pub deleted: Vec<PartitionDate>,
    /// Bytes released by the deletions.
    pub bytes_freed: u64,
    /// Free bytes once the pass finished.
    pub free_after: u64,
    /// Bytes still missing to reach the target (0 when met).
    pub shortfall: u64,
}

impl ReclaimReport {
    pub fn target_met(&self) -> bool {
        self.shortfall == 0
    }
}

impl Store {
    /// Delete fully synced partitions, oldest first, until at least
    /// `min_free_bytes` are free or no candidates remain.
    ///
    /// Partitions holding unsynced readings are never touched.
    pub fn reclaim(&mut self, min_free_bytes: u64) -> Result<ReclaimReport> {
        let mut report = ReclaimReport {
            free_after: self.space_accounting()?.free,
            ..Default::default()
        };
        if report.free_after >= min_free_bytes {
            return Ok(report);
        }

        info!(
            "Free space {} below {} bytes, reclaiming synced partitions",
            report.free_after, min_free_bytes
        );

        let candidates = self.list_partitions()?.into_iter().filter(|p| p.fully_synced);
        for partition in candidates {
            self.delete_into(partition.date, &mut report)?;
            report.free_after = self.space_accounting()?.free;
            if report.free_after >= min_free_bytes {
                break;
            }
        }

        report.shortfall = min_free_bytes.saturating_sub(report.free_after);
        if !report.target_met() {
            warn!(
                "Reclaim fell {} bytes short of {} after deleting {} partitions",
                report.shortfall,
                min_free_bytes,
                report.deleted.len()
            );
        }
        Ok(report)
    }

    /// Delete fully synced partitions older than `keep_days` before `today`.
    pub fn reclaim_expired(&mut self, today: PartitionDate, keep_days: u32) -> Result<ReclaimReport> {
        let cutoff = today.days_before(keep_days);
        let mut report = ReclaimReport::default();

        let expired = self
            .list_partitions()?
            .into_iter()
            .filter(|p| p.fully_synced && p.date < cutoff);
        for partition in expired {
            self.delete_into(partition.date, &mut report)?;
        }

        report.free_after = self.space_accounting()?.free;
        if !report.deleted.is_empty() {
            info!(
                "Removed {} synced partitions older than {} ({} bytes)",
                report.deleted.len(),
                cutoff,
                report.bytes_freed
            );
        }
        Ok(report)
    }

    fn delete_into(&mut self, date: PartitionDate, report: &mut ReclaimReport) -> Result<()> {
        match self.delete_partition(date) {
            Ok(freed) => {
                report.deleted.push(date);
                report.bytes_freed += freed;
                Ok(())
            }
            Err(Error::NotSynced(_)) => {
                warn!("Partition {} gained unsynced readings, skipping", date);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
