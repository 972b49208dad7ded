use serde::{Deserialize, Serialize};

use crate::{
    error::{FsError, Result},
    utils::traits::OnDiskRecord,
};

use super::{DIR_ENTRIES, DIR_ENTRY_SIZE, MAX_NAME_LEN};

/// one directory record as it lies on disk
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub used: u8,
    /// NUL-terminated, the last byte is always NUL
    pub name: [u8; MAX_NAME_LEN + 1],
    pub first_cluster: u16,
    pub size: u32,
}

impl Default for DirEntry {
    fn default() -> Self {
        DirEntry {
            used: 0,
            name: [0u8; MAX_NAME_LEN + 1],
            first_cluster: 0,
            size: 0,
        }
    }
}

impl OnDiskRecord for DirEntry {
    const SIZE: usize = DIR_ENTRY_SIZE;
}

impl DirEntry {
    pub fn new(name: &str, first_cluster: usize) -> Self {
        let mut entry = DirEntry {
            used: 1,
            first_cluster: first_cluster as u16,
            ..DirEntry::default()
        };
        entry.name[..name.len()].copy_from_slice(name.as_bytes());
        entry
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.used != 0
    }

    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .take(MAX_NAME_LEN)
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME_LEN);
        &self.name[..len]
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }
}

/// what `list` reports for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: u32,
}

/// check that `name` can be stored in a directory record
pub fn validate_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::NameTooLong {
            len: name.len(),
            max: MAX_NAME_LEN,
        });
    }
    if name.is_empty() || name.as_bytes().contains(&0) {
        return Err(FsError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// the flat directory, a fixed array of [DIR_ENTRIES] records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    entries: Box<[DirEntry]>,
}

impl Default for Directory {
    fn default() -> Self {
        Directory {
            entries: vec![DirEntry::default(); DIR_ENTRIES].into_boxed_slice(),
        }
    }
}

impl Directory {
    /// rebuild the directory from its on-disk cluster
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let entries = bytes
            .chunks_exact(DIR_ENTRY_SIZE)
            .take(DIR_ENTRIES)
            .map(DirEntry::decode_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Directory {
            entries: entries.into_boxed_slice(),
        })
    }

    /// the on-disk image, exactly one cluster long
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; DIR_ENTRIES * DIR_ENTRY_SIZE];
        for (entry, record) in self
            .entries
            .iter()
            .zip(bytes.chunks_exact_mut(DIR_ENTRY_SIZE))
        {
            entry.encode_into(record)?;
        }
        Ok(bytes)
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.is_used() && e.name_bytes() == name.as_bytes())
    }

    pub fn find_free_slot(&self) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| !e.is_used())
            .ok_or(FsError::DirectoryFull)
    }

    pub fn get(&self, slot: usize) -> Option<&DirEntry> {
        self.entries.get(slot).filter(|e| e.is_used())
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut DirEntry> {
        self.entries.get_mut(slot).filter(|e| e.is_used())
    }

    pub fn insert(&mut self, slot: usize, entry: DirEntry) {
        self.entries[slot] = entry;
    }

    pub fn clear(&mut self, slot: usize) {
        self.entries[slot].used = 0;
    }

    /// used entries in slot order, together with their slot
    pub fn iter_used(&self) -> impl Iterator<Item = (usize, &DirEntry)> + '_ {
        self.entries.iter().enumerate().filter(|(_, e)| e.is_used())
    }

    /// (name, size) of every used entry in slot order,
    /// calling it again restarts from the first slot
    pub fn list(&self) -> impl Iterator<Item = FileInfo> + '_ {
        self.iter_used().map(|(_, e)| FileInfo {
            name: e.name(),
            size: e.size,
        })
    }
}
