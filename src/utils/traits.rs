use bincode::config;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Trait for records stored at a fixed size inside a metadata cluster
/// # Note
/// records are encoded with the `legacy` bincode config,
/// which uses little-endian fixed-width integers and no length prefix for arrays,
/// so the encoded length only depends on the type
pub trait OnDiskRecord: Serialize + DeserializeOwned {
    /// the encoded length of one record
    const SIZE: usize;

    /// serialize into a slice of exactly [Self::SIZE] bytes
    fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        let encoded = bincode::serde::encode_to_vec(self, config::legacy())?;
        debug_assert_eq!(encoded.len(), Self::SIZE);
        buf[..encoded.len()].copy_from_slice(&encoded);
        Ok(())
    }

    /// deserialize from a slice
    /// # Returns
    /// the decoded record, trailing bytes are ignored
    fn decode_from(buf: &[u8]) -> Result<Self> {
        let (record, _read): (Self, usize) =
            bincode::serde::decode_from_slice(buf, config::legacy())?;
        Ok(record)
    }
}
