//! the sector-level device our filesystem lives on
use std::{
    fs::OpenOptions,
    io::{self, ErrorKind},
    path::Path,
};

use memmap2::MmapMut;

use crate::{
    error::{FsError, Result},
    fs::{CLUSTER_SIZE, SECTORS_PER_CLUSTER, SECTOR_SIZE},
};

/// API provided for the filesystem
///
/// every call reads or writes exactly one sector of [SECTOR_SIZE] bytes
pub trait BlockDevice {
    /// read sector `index` into `buf`
    fn read_sector(&self, index: u64, buf: &mut [u8]) -> io::Result<()>;

    /// write `buf` to sector `index`
    fn write_sector(&mut self, index: u64, buf: &[u8]) -> io::Result<()>;

    /// total addressable sectors
    fn sector_count(&self) -> u64;

    /// make previous writes durable
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// number of whole clusters on this device
    fn cluster_count(&self) -> u64 {
        self.sector_count() / SECTORS_PER_CLUSTER as u64
    }
}

/// read `buf.len() / CLUSTER_SIZE` consecutive clusters starting at `cluster`
pub fn read_clusters<D: BlockDevice + ?Sized>(
    device: &D,
    cluster: usize,
    buf: &mut [u8],
) -> Result<()> {
    debug_assert_eq!(buf.len() % CLUSTER_SIZE, 0);
    let first = (cluster * SECTORS_PER_CLUSTER) as u64;
    for (i, sector) in buf.chunks_exact_mut(SECTOR_SIZE).enumerate() {
        let index = first + i as u64;
        device
            .read_sector(index, sector)
            .map_err(|source| FsError::Io {
                sector: index,
                source,
            })?;
    }
    Ok(())
}

/// write `buf` to consecutive clusters starting at `cluster`
pub fn write_clusters<D: BlockDevice + ?Sized>(
    device: &mut D,
    cluster: usize,
    buf: &[u8],
) -> Result<()> {
    debug_assert_eq!(buf.len() % CLUSTER_SIZE, 0);
    let first = (cluster * SECTORS_PER_CLUSTER) as u64;
    for (i, sector) in buf.chunks_exact(SECTOR_SIZE).enumerate() {
        let index = first + i as u64;
        device
            .write_sector(index, sector)
            .map_err(|source| FsError::Io {
                sector: index,
                source,
            })?;
    }
    Ok(())
}

fn sector_range(index: u64, len: usize, sectors: u64) -> io::Result<std::ops::Range<usize>> {
    if index >= sectors {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("sector {index} is out of range, device has {sectors} sectors"),
        ));
    }
    if len != SECTOR_SIZE {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("sector buffer must be {SECTOR_SIZE} bytes, got {len}"),
        ));
    }
    let start = index as usize * SECTOR_SIZE;
    Ok(start..start + SECTOR_SIZE)
}

/// a device kept entirely in memory
#[derive(Debug, Clone)]
pub struct MemDisk {
    data: Vec<u8>,
}

impl MemDisk {
    /// create a zero-filled device with `sectors` sectors
    pub fn new(sectors: u64) -> Self {
        MemDisk {
            data: vec![0u8; sectors as usize * SECTOR_SIZE],
        }
    }

    /// create a device holding `clusters` whole clusters
    pub fn with_clusters(clusters: usize) -> Self {
        Self::new((clusters * SECTORS_PER_CLUSTER) as u64)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl BlockDevice for MemDisk {
    fn read_sector(&self, index: u64, buf: &mut [u8]) -> io::Result<()> {
        let range = sector_range(index, buf.len(), self.sector_count())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_sector(&mut self, index: u64, buf: &[u8]) -> io::Result<()> {
        let range = sector_range(index, buf.len(), self.sector_count())?;
        self.data[range].copy_from_slice(buf);
        Ok(())
    }

    fn sector_count(&self) -> u64 {
        (self.data.len() / SECTOR_SIZE) as u64
    }
}

/// an image file mapped into memory, something like a `Block Device`
#[derive(Debug)]
pub struct ImageFile {
    map: MmapMut,
}

impl ImageFile {
    /// open an existing image file for read and write
    pub fn open<P>(image_path: P) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(image_path.as_ref())?;
        Self::map(&file)
    }

    /// create a new zero-filled image file of `size` bytes,
    /// fails if the file already exists
    pub fn create<P>(image_path: P, size: u64) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(image_path.as_ref())?;
        // all other region are set to zero using `set_len` method
        file.set_len(size)?;
        Self::map(&file)
    }

    fn map(file: &std::fs::File) -> io::Result<Self> {
        // Safety
        // the mapping stays valid as long as nobody truncates the image file
        // while it is mapped, see https://docs.rs/memmap2/0.5.10/memmap2/struct.MmapMut.html
        let map = unsafe { MmapMut::map_mut(file)? };
        Ok(ImageFile { map })
    }
}

impl BlockDevice for ImageFile {
    fn read_sector(&self, index: u64, buf: &mut [u8]) -> io::Result<()> {
        let range = sector_range(index, buf.len(), self.sector_count())?;
        buf.copy_from_slice(&self.map[range]);
        Ok(())
    }

    fn write_sector(&mut self, index: u64, buf: &[u8]) -> io::Result<()> {
        let range = sector_range(index, buf.len(), self.sector_count())?;
        self.map[range].copy_from_slice(buf);
        Ok(())
    }

    fn sector_count(&self) -> u64 {
        (self.map.len() / SECTOR_SIZE) as u64
    }

    fn flush(&mut self) -> io::Result<()> {
        self.map.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_disk_sector_io() {
        let mut disk = MemDisk::new(4);
        assert_eq!(disk.sector_count(), 4);
        let data = [7u8; SECTOR_SIZE];
        disk.write_sector(2, &data).unwrap();

        let mut buf = [0u8; SECTOR_SIZE];
        disk.read_sector(2, &mut buf).unwrap();
        assert_eq!(buf, data);
        disk.read_sector(1, &mut buf).unwrap();
        assert_eq!(buf, [0u8; SECTOR_SIZE]);
    }

    #[test]
    fn test_out_of_range_sector() {
        let mut disk = MemDisk::new(2);
        let mut buf = [0u8; SECTOR_SIZE];
        assert!(disk.read_sector(2, &mut buf).is_err());
        assert!(disk.write_sector(5, &buf).is_err());
        // short buffers are rejected too
        assert!(disk.read_sector(0, &mut buf[..10]).is_err());
    }

    #[test]
    fn test_cluster_io_spans_sectors() {
        let mut disk = MemDisk::with_clusters(3);
        assert_eq!(disk.cluster_count(), 3);
        let cluster: Vec<u8> = (0..CLUSTER_SIZE).map(|i| (i % 251) as u8).collect();
        write_clusters(&mut disk, 1, &cluster).unwrap();

        let mut buf = vec![0u8; CLUSTER_SIZE];
        read_clusters(&disk, 1, &mut buf).unwrap();
        assert_eq!(buf, cluster);
        assert_eq!(&disk.as_bytes()[CLUSTER_SIZE..2 * CLUSTER_SIZE], &cluster[..]);

        let err = read_clusters(&disk, 3, &mut buf).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_image_file_round_trip() {
        let tmp_file = Path::new("/tmp/rsfs_block_device_test.img");
        if tmp_file.exists() {
            std::fs::remove_file(tmp_file).expect("remove tmp file failed");
        }
        {
            let mut image = ImageFile::create(tmp_file, 16 * SECTOR_SIZE as u64).unwrap();
            assert_eq!(image.sector_count(), 16);
            image.write_sector(3, &[0xabu8; SECTOR_SIZE]).unwrap();
            image.flush().unwrap();
        }
        // an existing image can't be created again
        assert!(ImageFile::create(tmp_file, SECTOR_SIZE as u64).is_err());

        let image = ImageFile::open(tmp_file).unwrap();
        let mut buf = [0u8; SECTOR_SIZE];
        image.read_sector(3, &mut buf).unwrap();
        assert_eq!(buf, [0xabu8; SECTOR_SIZE]);

        std::fs::remove_file(tmp_file).expect("test is passed,but remove temp file failed!")
    }
}
