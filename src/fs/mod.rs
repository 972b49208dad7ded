//! our single-volume filesystem
//!
//! the volume has the following layout, in clusters:
//! - `0..32`: the allocation table, one little-endian `u16` per cluster
//! - `32`: the directory, 128 records of 32 bytes
//! - `33..`: file data
pub mod check;
pub mod directory;
pub mod fat;
pub mod metadata;
pub mod open_file;
pub mod volume;

pub use check::*;
pub use directory::{DirEntry, FileInfo};
pub use fat::{AllocationTable, ClusterEntry};
pub use open_file::{FileHandle, OpenMode, WriteOutcome};
pub use volume::Volume;

pub const SECTOR_SIZE: usize = 512;
pub const SECTORS_PER_CLUSTER: usize = 8;
pub const CLUSTER_SIZE: usize = SECTOR_SIZE * SECTORS_PER_CLUSTER;

/// number of entries in the allocation table
pub const FAT_ENTRIES: usize = 65536;
/// clusters holding the serialized allocation table
pub const FAT_CLUSTERS: usize = FAT_ENTRIES * 2 / CLUSTER_SIZE;
/// cluster holding the serialized directory
pub const DIR_CLUSTER: usize = FAT_CLUSTERS;
pub const FIRST_DATA_CLUSTER: usize = DIR_CLUSTER + 1;
pub const RESERVED_CLUSTERS: usize = FIRST_DATA_CLUSTER;

pub const DIR_ENTRIES: usize = 128;
pub const DIR_ENTRY_SIZE: usize = 32;
pub const MAX_NAME_LEN: usize = 24;
pub const MAX_OPEN_FILES: usize = 128;

// allocation table markers
pub const FAT_FREE: u16 = 1;
pub const FAT_END_OF_CHAIN: u16 = 2;
pub const FAT_RESERVED_TABLE: u16 = 3;
pub const FAT_RESERVED_DIR: u16 = 4;

const _: () = assert!(FAT_CLUSTERS == 32);
const _: () = assert!(DIR_ENTRIES * DIR_ENTRY_SIZE == CLUSTER_SIZE);
