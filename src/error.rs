//! error kinds reported by the volume engine
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FsError>;

#[derive(Debug, Error)]
pub enum FsError {
    /// the allocation table failed validation, only `format` is allowed
    #[error("the allocation table is inconsistent (corrupted or not formatted)")]
    VolumeInvalid,
    #[error("file not found: {0:?}")]
    NotFound(String),
    #[error("file already exists: {0:?}")]
    AlreadyExists(String),
    #[error("the directory is full")]
    DirectoryFull,
    #[error("no free cluster left on the volume")]
    VolumeFull,
    #[error("file name is {len} bytes long, at most {max} are allowed")]
    NameTooLong { len: usize, max: usize },
    #[error("file name {0:?} is empty or contains a NUL byte")]
    InvalidName(String),
    #[error("invalid file handle {0}")]
    InvalidHandle(usize),
    #[error("file handle {handle} is not open for {wanted}")]
    WrongMode { handle: usize, wanted: &'static str },
    #[error("no free file handle left")]
    TooManyOpenFiles,
    #[error("file {0:?} is open")]
    FileBusy(String),
    #[error("device has {sectors} sectors, at least {needed} are needed")]
    DeviceTooSmall { sectors: u64, needed: u64 },
    #[error("cluster chain is broken at cluster {cluster} (value {value})")]
    CorruptChain { cluster: usize, value: u16 },
    /// a sector read or write failed
    #[error("I/O failure on sector {sector}")]
    Io {
        sector: u64,
        #[source]
        source: std::io::Error,
    },
    /// metadata could not be flushed, the in-memory tables were rolled back
    #[error("failed to persist volume metadata")]
    Persistence(#[source] Box<FsError>),
    /// a read or write hit a hard failure after moving `transferred` bytes,
    /// those bytes already belong to the file or to the caller's buffer
    #[error("transfer stopped after {transferred} bytes")]
    Interrupted {
        transferred: usize,
        #[source]
        source: Box<FsError>,
    },
    #[error("failed to encode on-disk record")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode on-disk record")]
    Decode(#[from] bincode::error::DecodeError),
}

impl FsError {
    /// whether this error is, or was caused by, an I/O failure reported by the block device
    pub fn is_io(&self) -> bool {
        match self {
            FsError::Io { .. } => true,
            FsError::Persistence(source) | FsError::Interrupted { source, .. } => source.is_io(),
            _ => false,
        }
    }

    /// bytes moved by the call before it failed
    pub fn transferred(&self) -> usize {
        match self {
            FsError::Interrupted { transferred, .. } => *transferred,
            _ => 0,
        }
    }

    /// `source` as seen by a caller once `transferred` bytes went through
    pub(crate) fn after(transferred: usize, source: FsError) -> FsError {
        if transferred == 0 {
            source
        } else {
            FsError::Interrupted {
                transferred,
                source: Box::new(source),
            }
        }
    }
}
