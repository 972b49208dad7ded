//! the cluster allocation table
use log::{debug, warn};

use crate::error::{FsError, Result};

use super::{
    CLUSTER_SIZE, DIR_CLUSTER, FAT_CLUSTERS, FAT_END_OF_CHAIN, FAT_ENTRIES, FAT_FREE,
    FAT_RESERVED_DIR, FAT_RESERVED_TABLE, FIRST_DATA_CLUSTER,
};

/// what a single allocation table entry says about its cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterEntry {
    Free,
    EndOfChain,
    ReservedTable,
    ReservedDir,
    /// the next cluster of the chain
    Next(u16),
    /// a value that is neither a marker nor a plausible successor
    Corrupt(u16),
}

impl From<u16> for ClusterEntry {
    fn from(value: u16) -> Self {
        match value {
            FAT_FREE => ClusterEntry::Free,
            FAT_END_OF_CHAIN => ClusterEntry::EndOfChain,
            FAT_RESERVED_TABLE => ClusterEntry::ReservedTable,
            FAT_RESERVED_DIR => ClusterEntry::ReservedDir,
            v if v as usize >= FIRST_DATA_CLUSTER => ClusterEntry::Next(v),
            v => ClusterEntry::Corrupt(v),
        }
    }
}

impl From<ClusterEntry> for u16 {
    fn from(entry: ClusterEntry) -> Self {
        match entry {
            ClusterEntry::Free => FAT_FREE,
            ClusterEntry::EndOfChain => FAT_END_OF_CHAIN,
            ClusterEntry::ReservedTable => FAT_RESERVED_TABLE,
            ClusterEntry::ReservedDir => FAT_RESERVED_DIR,
            ClusterEntry::Next(v) | ClusterEntry::Corrupt(v) => v,
        }
    }
}

/// one entry per cluster, mapping it to its successor or a marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationTable {
    entries: Box<[u16]>,
    /// clusters past this index don't exist on the device
    limit: usize,
}

impl AllocationTable {
    /// an all-zero table, which never passes validation
    pub fn unformatted(limit: usize) -> Self {
        AllocationTable {
            entries: vec![0u16; FAT_ENTRIES].into_boxed_slice(),
            limit: limit.min(FAT_ENTRIES),
        }
    }

    /// a freshly formatted table: reserved region marked, everything else free
    pub fn formatted(limit: usize) -> Self {
        let mut table = Self::unformatted(limit);
        table.entries[..FAT_CLUSTERS].fill(FAT_RESERVED_TABLE);
        table.entries[DIR_CLUSTER] = FAT_RESERVED_DIR;
        table.entries[FIRST_DATA_CLUSTER..].fill(FAT_FREE);
        table
    }

    /// rebuild a table from its raw little-endian image
    pub fn from_bytes(bytes: &[u8], limit: usize) -> Self {
        let mut table = Self::unformatted(limit);
        for (entry, raw) in table.entries.iter_mut().zip(bytes.chunks_exact(2)) {
            *entry = u16::from_le_bytes([raw[0], raw[1]]);
        }
        table
    }

    /// the raw little-endian image, exactly [FAT_CLUSTERS] clusters long
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FAT_CLUSTERS * CLUSTER_SIZE);
        for entry in self.entries.iter() {
            bytes.extend_from_slice(&entry.to_le_bytes());
        }
        bytes
    }

    /// scan every entry, stopping at the first one that breaks the layout
    /// # Return
    /// `Err((index, value))` for the first offending entry
    pub fn validate(&self) -> std::result::Result<(), (usize, u16)> {
        for (i, &value) in self.entries.iter().enumerate() {
            let ok = match ClusterEntry::from(value) {
                ClusterEntry::ReservedTable => i < FAT_CLUSTERS,
                ClusterEntry::ReservedDir => i == DIR_CLUSTER,
                ClusterEntry::Free | ClusterEntry::EndOfChain | ClusterEntry::Next(_) => {
                    i >= FIRST_DATA_CLUSTER
                }
                ClusterEntry::Corrupt(_) => false,
            };
            if !ok {
                warn!("allocation table corrupted at entry {i}, value = {value}");
                return Err((i, value));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn entry(&self, cluster: usize) -> ClusterEntry {
        self.entries
            .get(cluster)
            .map_or(ClusterEntry::Corrupt(0), |v| ClusterEntry::from(*v))
    }

    #[inline]
    pub fn set(&mut self, cluster: usize, entry: ClusterEntry) {
        self.entries[cluster] = entry.into();
    }

    /// clusters past this index are not backed by the device
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// whether `cluster` may belong to a file chain
    pub fn is_data_cluster(&self, cluster: usize) -> bool {
        (FIRST_DATA_CLUSTER..self.limit).contains(&cluster)
    }

    /// find the first free cluster on the device and mark it as a chain end
    pub fn allocate_free_cluster(&mut self) -> Result<usize> {
        let cluster = (FIRST_DATA_CLUSTER..self.limit)
            .find(|&i| self.entries[i] == FAT_FREE)
            .ok_or(FsError::VolumeFull)?;
        self.entries[cluster] = FAT_END_OF_CHAIN;
        debug!("allocated cluster {cluster}");
        Ok(cluster)
    }

    /// link `next` after `tail`, `next` becomes the new chain end
    pub fn extend_chain(&mut self, tail: usize, next: usize) {
        self.entries[tail] = next as u16;
        self.entries[next] = FAT_END_OF_CHAIN;
        debug!("chain extended: {tail} -> {next}");
    }

    /// release every cluster of the chain starting at `start`, including its end
    /// # Return
    /// the number of clusters released
    pub fn free_cluster_chain(&mut self, start: usize) -> Result<usize> {
        let chain = self.chain(start)?;
        for &cluster in &chain {
            self.entries[cluster] = FAT_FREE;
        }
        debug!("released {} clusters starting at {start}", chain.len());
        Ok(chain.len())
    }

    /// the clusters of the chain starting at `start`, in order
    ///
    /// stops with [FsError::CorruptChain] on a marker that can't be part of a chain,
    /// on a link to a cluster outside the device, or on a cycle
    pub fn chain(&self, start: usize) -> Result<Vec<usize>> {
        let mut chain = Vec::new();
        let mut cluster = start;
        loop {
            if !self.is_data_cluster(cluster) || chain.len() >= self.limit {
                return Err(FsError::CorruptChain {
                    cluster,
                    value: self.entries.get(cluster).copied().unwrap_or(0),
                });
            }
            chain.push(cluster);
            match self.entry(cluster) {
                ClusterEntry::EndOfChain => return Ok(chain),
                ClusterEntry::Next(next) => cluster = next as usize,
                other => {
                    return Err(FsError::CorruptChain {
                        cluster,
                        value: other.into(),
                    })
                }
            }
        }
    }

    /// number of free clusters that exist on the device
    pub fn free_clusters(&self) -> usize {
        self.entries
            .get(FIRST_DATA_CLUSTER..self.limit)
            .map_or(0, |data| data.iter().filter(|&&v| v == FAT_FREE).count())
    }

    pub fn remaining_free_bytes(&self) -> u64 {
        self.free_clusters() as u64 * CLUSTER_SIZE as u64
    }
}
