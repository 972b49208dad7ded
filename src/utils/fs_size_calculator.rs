//! This module contains functions to calculate the size of different fs components

use crate::fs::{CLUSTER_SIZE, FAT_ENTRIES, RESERVED_CLUSTERS, SECTORS_PER_CLUSTER};

/// the smallest image that can hold the reserved region
/// # Example
/// ```
/// use rsfs::utils::fs_size_calculator::min_image_size;
/// assert_eq!(min_image_size(), 33 * 4096);
/// ```
pub const fn min_image_size() -> u64 {
    (RESERVED_CLUSTERS * CLUSTER_SIZE) as u64
}

/// the sectors needed to hold the reserved region
pub const fn min_sector_count() -> u64 {
    (RESERVED_CLUSTERS * SECTORS_PER_CLUSTER) as u64
}

/// the largest image whose clusters can all be addressed by the allocation table
/// # Example
/// ```
/// use rsfs::utils::fs_size_calculator::max_image_size;
/// assert_eq!(max_image_size(), 65536 * 4096);
/// ```
pub const fn max_image_size() -> u64 {
    (FAT_ENTRIES * CLUSTER_SIZE) as u64
}

/// round an image size down to whole clusters
/// # Example
/// ```
/// use rsfs::utils::fs_size_calculator::align_to_cluster;
/// assert_eq!(align_to_cluster(4096 * 40 + 100), 4096 * 40);
/// ```
pub const fn align_to_cluster(size: u64) -> u64 {
    size / CLUSTER_SIZE as u64 * CLUSTER_SIZE as u64
}

/// clusters addressable on a device holding `clusters` whole clusters,
/// capped by the allocation table size
pub fn usable_clusters(clusters: u64) -> usize {
    clusters.min(FAT_ENTRIES as u64) as usize
}

/// clusters a file of `size` bytes occupies, a file always owns at least one
/// # Example
/// ```
/// use rsfs::utils::fs_size_calculator::clusters_for_size;
/// assert_eq!(clusters_for_size(0), 1);
/// assert_eq!(clusters_for_size(4096), 1);
/// assert_eq!(clusters_for_size(4097), 2);
/// ```
pub const fn clusters_for_size(size: u64) -> u64 {
    if size == 0 {
        1
    } else {
        size.div_ceil(CLUSTER_SIZE as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::SECTOR_SIZE;

    #[test]
    fn test_usable_clusters() {
        assert_eq!(usable_clusters(0), 0);
        assert_eq!(usable_clusters(40), 40);
        // a device larger than the table can address is capped
        assert_eq!(usable_clusters(u64::MAX), FAT_ENTRIES);
    }

    #[test]
    fn test_min_sector_count() {
        assert_eq!(min_sector_count() * SECTOR_SIZE as u64, min_image_size());
    }
}
