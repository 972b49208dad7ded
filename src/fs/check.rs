//! a read-only consistency check over every file chain
use bitvec::prelude::*;
use log::{info, warn};

use crate::{block_device::BlockDevice, error::Result, utils::fs_size_calculator};

use super::{ClusterEntry, Volume, FIRST_DATA_CLUSTER};

/// one inconsistency found by [Volume::check]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// the directory entry points outside the data region
    BadStartCluster { name: String, cluster: usize },
    /// the chain runs into a marker or a cluster outside the device
    BrokenChain { name: String, cluster: usize },
    /// the chain reaches a cluster already visited, by this file or another
    SharedCluster { name: String, cluster: usize },
    /// the recorded size doesn't fit the chain length
    SizeMismatch {
        name: String,
        size: u32,
        clusters: usize,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub files: usize,
    /// clusters reachable from the directory
    pub used_clusters: usize,
    /// clusters marked in use that no file reaches
    pub lost_clusters: Vec<usize>,
    pub problems: Vec<Problem>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.lost_clusters.is_empty() && self.problems.is_empty()
    }
}

impl<D: BlockDevice> Volume<D> {
    /// walk every chain and report what doesn't add up, nothing gets repaired
    pub fn check(&self) -> Result<CheckReport> {
        info!("check() called");
        self.ensure_valid()?;
        let fat = &self.metadata().fat;
        let mut seen = bitvec![u8, Lsb0; 0; fat.limit()];
        let mut report = CheckReport::default();

        for (slot, entry) in self.metadata().dir.iter_used() {
            report.files += 1;
            let name = entry.name();
            let mut cluster = entry.first_cluster as usize;
            let mut length = 0;
            loop {
                if !fat.is_data_cluster(cluster) {
                    report.problems.push(if length == 0 {
                        Problem::BadStartCluster { name, cluster }
                    } else {
                        Problem::BrokenChain { name, cluster }
                    });
                    break;
                }
                if seen[cluster] {
                    report.problems.push(Problem::SharedCluster { name, cluster });
                    break;
                }
                seen.set(cluster, true);
                length += 1;
                match fat.entry(cluster) {
                    ClusterEntry::EndOfChain => {
                        // a writer's size is only recorded when it closes
                        let expected = fs_size_calculator::clusters_for_size(entry.size as u64);
                        if !self.is_open_for_write(slot) && expected != length as u64 {
                            report.problems.push(Problem::SizeMismatch {
                                name,
                                size: entry.size,
                                clusters: length,
                            });
                        }
                        break;
                    }
                    ClusterEntry::Next(next) => cluster = next as usize,
                    _ => {
                        report.problems.push(Problem::BrokenChain { name, cluster });
                        break;
                    }
                }
            }
            report.used_clusters += length;
        }

        report.lost_clusters = (FIRST_DATA_CLUSTER..fat.limit())
            .filter(|&c| fat.entry(c) != ClusterEntry::Free && !seen[c])
            .collect();

        if report.is_clean() {
            info!("volume is consistent, {} files", report.files);
        } else {
            warn!(
                "volume has {} problems and {} lost clusters",
                report.problems.len(),
                report.lost_clusters.len()
            );
        }
        Ok(report)
    }
}
