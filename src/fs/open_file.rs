//! per-handle cursors over open files
use std::fmt;

use crate::error::{FsError, Result};

use super::{CLUSTER_SIZE, MAX_OPEN_FILES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

impl OpenMode {
    fn describe(self) -> &'static str {
        match self {
            OpenMode::Read => "reading",
            OpenMode::Write => "writing",
        }
    }
}

/// index of a slot in the open-file table,
/// the same index is handed out again once the slot is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(usize);

impl FileHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for FileHandle {
    fn from(index: usize) -> Self {
        FileHandle(index)
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// how a `write` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// every byte was accepted
    Complete(usize),
    /// the volume ran out of clusters after accepting this many bytes
    VolumeFull(usize),
}

impl WriteOutcome {
    /// bytes accepted into the file
    pub fn accepted(self) -> usize {
        match self {
            WriteOutcome::Complete(n) | WriteOutcome::VolumeFull(n) => n,
        }
    }
}

/// the state of one open file
#[derive(Debug)]
pub struct OpenFile {
    pub mode: OpenMode,
    /// the cluster whose bytes are held in `buffer`
    pub cluster: usize,
    /// offset of the next byte inside `buffer`
    pub cursor: usize,
    /// bytes consumed so far, only meaningful for readers
    pub position: u64,
    /// bytes written so far for writers, the recorded size for readers
    pub size: u32,
    /// the directory slot this file belongs to
    pub dir_slot: usize,
    buffer: Box<[u8]>,
}

impl OpenFile {
    pub fn new(mode: OpenMode, dir_slot: usize, first_cluster: usize, size: u32) -> Self {
        OpenFile {
            mode,
            cluster: first_cluster,
            cursor: 0,
            position: 0,
            size,
            dir_slot,
            buffer: vec![0u8; CLUSTER_SIZE].into_boxed_slice(),
        }
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// the cursor reached the end of the buffered cluster
    #[inline]
    pub fn at_cluster_end(&self) -> bool {
        self.cursor == CLUSTER_SIZE
    }

    /// every byte of the file has been consumed
    #[inline]
    pub fn at_end_of_file(&self) -> bool {
        self.position >= self.size as u64
    }

    /// point the cursor at the start of `cluster`, whose bytes must be loaded by the caller
    pub fn move_to(&mut self, cluster: usize) {
        self.cluster = cluster;
        self.cursor = 0;
    }

    /// copy buffered bytes into `out`, never past the cluster end or the file end
    /// # Return
    /// the number of bytes copied
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let left_in_file = (self.size as u64 - self.position.min(self.size as u64)) as usize;
        let n = out
            .len()
            .min(CLUSTER_SIZE - self.cursor)
            .min(left_in_file);
        out[..n].copy_from_slice(&self.buffer[self.cursor..self.cursor + n]);
        self.cursor += n;
        self.position += n as u64;
        n
    }

    /// copy bytes from `data` into the buffer, never past the cluster end
    /// # Return
    /// the number of bytes accepted
    pub fn fill_from(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(CLUSTER_SIZE - self.cursor);
        self.buffer[self.cursor..self.cursor + n].copy_from_slice(&data[..n]);
        self.cursor += n;
        self.size += n as u32;
        n
    }
}

/// the fixed table of [MAX_OPEN_FILES] handle slots
#[derive(Debug)]
pub struct OpenFileTable {
    slots: Vec<Option<OpenFile>>,
}

impl Default for OpenFileTable {
    fn default() -> Self {
        OpenFileTable {
            slots: (0..MAX_OPEN_FILES).map(|_| None).collect(),
        }
    }
}

impl OpenFileTable {
    /// the lowest closed slot
    pub fn free_slot(&self) -> Result<FileHandle> {
        self.slots
            .iter()
            .position(Option::is_none)
            .map(FileHandle)
            .ok_or(FsError::TooManyOpenFiles)
    }

    pub fn install(&mut self, handle: FileHandle, file: OpenFile) {
        self.slots[handle.0] = Some(file);
    }

    pub fn get(&self, handle: FileHandle) -> Result<&OpenFile> {
        self.slots
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or(FsError::InvalidHandle(handle.0))
    }

    /// the open file behind `handle`, which must be open in `mode`
    pub fn get_mut(&mut self, handle: FileHandle, mode: OpenMode) -> Result<&mut OpenFile> {
        let file = self
            .slots
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(FsError::InvalidHandle(handle.0))?;
        if file.mode != mode {
            return Err(FsError::WrongMode {
                handle: handle.0,
                wanted: mode.describe(),
            });
        }
        Ok(file)
    }

    /// close `handle`, giving back its state and buffer
    pub fn release(&mut self, handle: FileHandle) -> Result<OpenFile> {
        self.slots
            .get_mut(handle.0)
            .and_then(Option::take)
            .ok_or(FsError::InvalidHandle(handle.0))
    }

    /// whether any handle refers to directory slot `dir_slot`
    pub fn is_open(&self, dir_slot: usize) -> bool {
        self.slots.iter().flatten().any(|f| f.dir_slot == dir_slot)
    }

    /// whether a writer holds directory slot `dir_slot`
    pub fn is_open_for_write(&self, dir_slot: usize) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|f| f.dir_slot == dir_slot && f.mode == OpenMode::Write)
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn close_all(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_stops_at_cluster_end() {
        let mut file = OpenFile::new(OpenMode::Write, 0, 33, 0);
        let data = vec![1u8; CLUSTER_SIZE + 10];
        assert_eq!(file.fill_from(&data), CLUSTER_SIZE);
        assert!(file.at_cluster_end());
        assert_eq!(file.size as usize, CLUSTER_SIZE);
        assert_eq!(file.fill_from(&data), 0);

        file.move_to(34);
        assert_eq!(file.fill_from(&data[..10]), 10);
        assert_eq!(file.size as usize, CLUSTER_SIZE + 10);
    }

    #[test]
    fn test_drain_stops_at_file_end() {
        let mut file = OpenFile::new(OpenMode::Read, 0, 33, 5);
        file.buffer_mut()[..5].copy_from_slice(b"hello");
        let mut out = [0u8; 16];
        assert_eq!(file.drain_into(&mut out[..3]), 3);
        assert_eq!(file.drain_into(&mut out[3..]), 2);
        assert_eq!(&out[..5], b"hello");
        assert!(file.at_end_of_file());
        assert_eq!(file.drain_into(&mut out), 0);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut table = OpenFileTable::default();
        let first = table.free_slot().unwrap();
        table.install(first, OpenFile::new(OpenMode::Read, 4, 33, 0));
        let second = table.free_slot().unwrap();
        assert_ne!(first, second);
        assert!(table.is_open(4));
        assert!(!table.is_open_for_write(4));

        table.release(first).unwrap();
        assert!(!table.is_open(4));
        assert_eq!(table.free_slot().unwrap(), first);
        assert!(matches!(
            table.release(first),
            Err(FsError::InvalidHandle(0))
        ));
    }

    #[test]
    fn test_handle_checks() {
        let mut table = OpenFileTable::default();
        let handle = table.free_slot().unwrap();
        table.install(handle, OpenFile::new(OpenMode::Write, 0, 33, 0));
        assert!(table.is_open_for_write(0));
        assert!(table.get_mut(handle, OpenMode::Write).is_ok());
        assert!(matches!(
            table.get_mut(handle, OpenMode::Read),
            Err(FsError::WrongMode { .. })
        ));
        assert!(matches!(
            table.get(FileHandle::from(MAX_OPEN_FILES)),
            Err(FsError::InvalidHandle(_))
        ));
        assert!(matches!(
            table.get(FileHandle::from(1)),
            Err(FsError::InvalidHandle(1))
        ));
    }

    #[test]
    fn test_table_fills_up() {
        let mut table = OpenFileTable::default();
        for i in 0..MAX_OPEN_FILES {
            let handle = table.free_slot().unwrap();
            table.install(handle, OpenFile::new(OpenMode::Read, i, 33, 0));
        }
        assert_eq!(table.open_count(), MAX_OPEN_FILES);
        assert!(matches!(table.free_slot(), Err(FsError::TooManyOpenFiles)));
        table.close_all();
        assert_eq!(table.open_count(), 0);
    }
}
