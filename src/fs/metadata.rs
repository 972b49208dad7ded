//! moving the allocation table and the directory between memory and the reserved region
use log::{debug, info};

use crate::{
    block_device::{read_clusters, write_clusters, BlockDevice},
    error::{FsError, Result},
    utils::fs_size_calculator,
};

use super::{
    directory::Directory, fat::AllocationTable, CLUSTER_SIZE, DIR_CLUSTER, FAT_CLUSTERS,
};

/// the in-memory mirror of the reserved region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub fat: AllocationTable,
    pub dir: Directory,
}

/// fail with [FsError::DeviceTooSmall] if `device` can't hold the reserved region
pub fn ensure_capacity<D: BlockDevice + ?Sized>(device: &D) -> Result<()> {
    let sectors = device.sector_count();
    let needed = fs_size_calculator::min_sector_count();
    if sectors < needed {
        return Err(FsError::DeviceTooSmall { sectors, needed });
    }
    Ok(())
}

/// read the reserved region
/// # Return
/// the metadata and whether the allocation table passed validation
pub fn load<D: BlockDevice + ?Sized>(device: &D) -> Result<(Metadata, bool)> {
    ensure_capacity(device)?;
    let limit = fs_size_calculator::usable_clusters(device.cluster_count());

    let mut fat_bytes = vec![0u8; FAT_CLUSTERS * CLUSTER_SIZE];
    read_clusters(device, 0, &mut fat_bytes)?;
    let mut dir_bytes = vec![0u8; CLUSTER_SIZE];
    read_clusters(device, DIR_CLUSTER, &mut dir_bytes)?;

    let fat = AllocationTable::from_bytes(&fat_bytes, limit);
    let dir = Directory::from_bytes(&dir_bytes)?;
    let valid = fat.validate().is_ok();
    if valid {
        info!("allocation table is OK, {} clusters on device", limit);
    }
    Ok((Metadata { fat, dir }, valid))
}

/// write the allocation table and the directory back to the reserved region
pub fn persist<D: BlockDevice + ?Sized>(
    device: &mut D,
    fat: &AllocationTable,
    dir: &Directory,
) -> Result<()> {
    write_clusters(device, 0, &fat.to_bytes())?;
    write_clusters(device, DIR_CLUSTER, &dir.to_bytes()?)?;
    device.flush().map_err(|source| FsError::Io { sector: 0, source })?;
    debug!("metadata persisted");
    Ok(())
}
