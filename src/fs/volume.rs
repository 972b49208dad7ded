//! what does our filesystem look like in the memory
use log::{debug, info, warn};

use crate::{
    block_device::{read_clusters, write_clusters, BlockDevice},
    error::{FsError, Result},
    utils::fs_size_calculator,
};

use super::{
    directory::{validate_name, DirEntry, Directory, FileInfo},
    fat::{AllocationTable, ClusterEntry},
    metadata::{self, Metadata},
    open_file::{FileHandle, OpenFile, OpenFileTable, OpenMode, WriteOutcome},
};

/// a mounted volume: the device, the mirror of its reserved region and the open files
///
/// every operation that changes the allocation table or the directory
/// persists both before returning; if that fails the tables are rolled back
/// to what they were before the operation
#[derive(Debug)]
pub struct Volume<D: BlockDevice> {
    device: D,
    meta: Metadata,
    files: OpenFileTable,
    /// whether the allocation table passed validation
    valid: bool,
}

impl<D: BlockDevice> Volume<D> {
    /// wrap `device` without reading it,
    /// the volume is invalid until [Volume::initialize] or [Volume::format] succeeds
    pub fn new(device: D) -> Self {
        let limit = fs_size_calculator::usable_clusters(device.cluster_count());
        Volume {
            device,
            meta: Metadata {
                fat: AllocationTable::unformatted(limit),
                dir: Directory::default(),
            },
            files: OpenFileTable::default(),
            valid: false,
        }
    }

    /// wrap `device` and load its metadata
    /// # Return
    /// the volume, which may still be invalid if its allocation table is corrupted
    pub fn mount(device: D) -> Result<Self> {
        let mut volume = Self::new(device);
        volume.initialize()?;
        Ok(volume)
    }

    /// load and validate the metadata of the device
    /// # Return
    /// whether the allocation table is valid,
    /// an I/O failure leaves the volume usable for [Volume::format] only
    pub fn initialize(&mut self) -> Result<bool> {
        info!("initialize() called");
        self.files.close_all();
        self.valid = false;
        let (meta, valid) = metadata::load(&self.device)?;
        self.meta = meta;
        self.valid = valid;
        if !valid {
            warn!("allocation table is inconsistent, the volume must be formatted");
        }
        Ok(valid)
    }

    /// reset the device to an empty volume, closing every open file
    pub fn format(&mut self) -> Result<()> {
        info!("format() called");
        metadata::ensure_capacity(&self.device)?;
        let limit = fs_size_calculator::usable_clusters(self.device.cluster_count());
        self.files.close_all();
        self.meta = Metadata {
            fat: AllocationTable::formatted(limit),
            dir: Directory::default(),
        };
        self.valid = false;
        metadata::persist(&mut self.device, &self.meta.fat, &self.meta.dir)
            .map_err(|e| FsError::Persistence(Box::new(e)))?;
        self.valid = true;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// give back the device, dropping every open file without closing it
    pub fn into_device(self) -> D {
        self.device
    }

    /// bytes still available for file data
    pub fn free_space_bytes(&self) -> Result<u64> {
        self.ensure_valid()?;
        Ok(self.meta.fat.remaining_free_bytes())
    }

    /// (name, size) of every file, in directory slot order
    pub fn list_files(&self) -> Result<impl Iterator<Item = FileInfo> + '_> {
        self.ensure_valid()?;
        Ok(self.meta.dir.list())
    }

    /// create an empty file owning one cluster
    pub fn create_file(&mut self, name: &str) -> Result<()> {
        info!("create_file() called with name: {name:?}");
        self.ensure_valid()?;
        self.staged(|volume| volume.insert_entry(name).map(|_| ()))
    }

    /// remove a file and release its whole cluster chain
    pub fn delete_file(&mut self, name: &str) -> Result<()> {
        info!("delete_file() called with name: {name:?}");
        self.ensure_valid()?;
        let slot = self.find_closed(name)?;
        self.staged(|volume| volume.remove_entry(slot))
    }

    /// open `name` for reading, or truncate-and-create it for writing
    pub fn open_file(&mut self, name: &str, mode: OpenMode) -> Result<FileHandle> {
        info!("open_file() called with name: {name:?}, mode: {mode:?}");
        self.ensure_valid()?;
        let handle = self.files.free_slot()?;
        let file = match mode {
            OpenMode::Read => {
                let slot = self
                    .meta
                    .dir
                    .find_by_name(name)
                    .ok_or_else(|| FsError::NotFound(name.to_string()))?;
                let entry = *self.entry(slot)?;
                let first = entry.first_cluster as usize;
                if !self.meta.fat.is_data_cluster(first) {
                    return Err(FsError::CorruptChain {
                        cluster: first,
                        value: self.meta.fat.entry(first).into(),
                    });
                }
                let mut file = OpenFile::new(OpenMode::Read, slot, first, entry.size);
                read_clusters(&self.device, first, file.buffer_mut())?;
                file
            }
            OpenMode::Write => {
                validate_name(name)?;
                let existing = match self.meta.dir.find_by_name(name) {
                    Some(_) => Some(self.find_closed(name)?),
                    None => None,
                };
                let slot = self.staged(|volume| {
                    if let Some(slot) = existing {
                        volume.remove_entry(slot)?;
                    }
                    volume.insert_entry(name)
                })?;
                let first = self.entry(slot)?.first_cluster as usize;
                OpenFile::new(OpenMode::Write, slot, first, 0)
            }
        };
        self.files.install(handle, file);
        debug!("{name:?} opened as {handle}");
        Ok(handle)
    }

    /// read up to `out.len()` bytes
    /// # Return
    /// the bytes produced, fewer than asked (down to 0) once the end of the file is reached
    ///
    /// a failure after some bytes were produced is reported as [FsError::Interrupted],
    /// the handle stays where it stopped so the next call retries the failed cluster
    pub fn read_file(&mut self, handle: FileHandle, out: &mut [u8]) -> Result<usize> {
        let Volume {
            device,
            meta,
            files,
            ..
        } = self;
        let file = files.get_mut(handle, OpenMode::Read)?;
        let mut produced = 0;
        while produced < out.len() && !file.at_end_of_file() {
            if file.at_cluster_end() {
                match advance_reader(&*device, meta, file) {
                    Ok(true) => debug!("{handle} moved to cluster {}", file.cluster),
                    // the recorded size says there is more, but the chain ends here
                    Ok(false) => break,
                    Err(e) => return Err(FsError::after(produced, e)),
                }
            }
            produced += file.drain_into(&mut out[produced..]);
        }
        Ok(produced)
    }

    /// append `data` to a file open for writing
    ///
    /// a new cluster is only allocated once a byte must be stored past the end of the current one
    /// # Return
    /// [WriteOutcome::VolumeFull] with the bytes accepted if the volume ran out of clusters
    ///
    /// a hard failure after some bytes were accepted is reported as [FsError::Interrupted],
    /// those bytes stay in the file and the rest of `data` can be written again
    pub fn write_file(&mut self, handle: FileHandle, data: &[u8]) -> Result<WriteOutcome> {
        let Volume {
            device,
            meta,
            files,
            ..
        } = self;
        let file = files.get_mut(handle, OpenMode::Write)?;
        let mut accepted = 0;
        while accepted < data.len() {
            if file.at_cluster_end() {
                match advance_writer(&mut *device, meta, file) {
                    Ok(true) => debug!("{handle} moved to cluster {}", file.cluster),
                    Ok(false) => {
                        warn!("volume is full, {handle} accepted {accepted} bytes");
                        return Ok(WriteOutcome::VolumeFull(accepted));
                    }
                    Err(e) => return Err(FsError::after(accepted, e)),
                }
            }
            accepted += file.fill_from(&data[accepted..]);
        }
        Ok(WriteOutcome::Complete(accepted))
    }

    /// close `handle`, a writer's size only becomes durable here
    ///
    /// if flushing fails the handle stays open so the close can be retried
    pub fn close_file(&mut self, handle: FileHandle) -> Result<()> {
        info!("close_file() called with handle: {handle}");
        let file = self.files.get(handle)?;
        if file.mode == OpenMode::Write {
            write_clusters(&mut self.device, file.cluster, file.buffer())?;
            let (slot, size) = (file.dir_slot, file.size);
            self.staged(|volume| {
                volume
                    .meta
                    .dir
                    .get_mut(slot)
                    .ok_or(FsError::InvalidHandle(handle.index()))?
                    .size = size;
                Ok(())
            })?;
        }
        self.files.release(handle)?;
        Ok(())
    }

    pub fn open_files(&self) -> usize {
        self.files.open_count()
    }

    pub(crate) fn metadata(&self) -> &Metadata {
        &self.meta
    }

    #[cfg(test)]
    pub(crate) fn meta_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }

    pub(crate) fn is_open_for_write(&self, slot: usize) -> bool {
        self.files.is_open_for_write(slot)
    }
}

/// helpers shared by the operations above
impl<D: BlockDevice> Volume<D> {
    #[inline]
    pub(crate) fn ensure_valid(&self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(FsError::VolumeInvalid)
        }
    }

    fn entry(&self, slot: usize) -> Result<&DirEntry> {
        self.meta
            .dir
            .get(slot)
            .ok_or(FsError::NotFound(format!("directory slot {slot}")))
    }

    /// the slot of `name`, which must not be open
    fn find_closed(&self, name: &str) -> Result<usize> {
        let slot = self
            .meta
            .dir
            .find_by_name(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        if self.files.is_open(slot) {
            return Err(FsError::FileBusy(name.to_string()));
        }
        Ok(slot)
    }

    /// reserve a directory slot and a first cluster for `name`
    fn insert_entry(&mut self, name: &str) -> Result<usize> {
        validate_name(name)?;
        if self.meta.dir.find_by_name(name).is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        let slot = self.meta.dir.find_free_slot()?;
        let cluster = self.meta.fat.allocate_free_cluster()?;
        self.meta.dir.insert(slot, DirEntry::new(name, cluster));
        Ok(slot)
    }

    fn remove_entry(&mut self, slot: usize) -> Result<()> {
        let first = self.entry(slot)?.first_cluster as usize;
        self.meta.fat.free_cluster_chain(first)?;
        self.meta.dir.clear(slot);
        Ok(())
    }

    /// apply `mutate` to the tables and persist them,
    /// restoring the previous tables if either step fails
    fn staged<T>(&mut self, mutate: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = self.meta.clone();
        let value = match mutate(self) {
            Ok(value) => value,
            Err(e) => {
                self.meta = snapshot;
                return Err(e);
            }
        };
        if let Err(e) = metadata::persist(&mut self.device, &self.meta.fat, &self.meta.dir) {
            warn!("failed to persist metadata, rolling back: {e}");
            self.meta = snapshot;
            return Err(FsError::Persistence(Box::new(e)));
        }
        Ok(value)
    }
}

/// load the cluster after the one a reader has used up
/// # Return
/// false if the chain ends there
fn advance_reader<D: BlockDevice>(
    device: &D,
    meta: &Metadata,
    file: &mut OpenFile,
) -> Result<bool> {
    match meta.fat.entry(file.cluster) {
        ClusterEntry::EndOfChain => Ok(false),
        ClusterEntry::Next(next) if meta.fat.is_data_cluster(next as usize) => {
            read_clusters(device, next as usize, file.buffer_mut())?;
            file.move_to(next as usize);
            Ok(true)
        }
        other => Err(FsError::CorruptChain {
            cluster: file.cluster,
            value: other.into(),
        }),
    }
}

/// flush a writer's full cluster and chain a fresh one after it,
/// the chain is persisted before the writer moves on
/// # Return
/// false if no cluster is left
fn advance_writer<D: BlockDevice>(
    device: &mut D,
    meta: &mut Metadata,
    file: &mut OpenFile,
) -> Result<bool> {
    write_clusters(device, file.cluster, file.buffer())?;
    let next = match meta.fat.allocate_free_cluster() {
        Ok(next) => next,
        Err(FsError::VolumeFull) => return Ok(false),
        Err(e) => return Err(e),
    };
    meta.fat.extend_chain(file.cluster, next);
    if let Err(e) = metadata::persist(device, &meta.fat, &meta.dir) {
        meta.fat.set(next, ClusterEntry::Free);
        meta.fat.set(file.cluster, ClusterEntry::EndOfChain);
        return Err(FsError::Persistence(Box::new(e)));
    }
    file.move_to(next);
    file.buffer_mut().fill(0);
    Ok(true)
}
