//! create our filesystem
use std::path::Path;

use anyhow::{anyhow, Context};
use byte_unit::Byte;
use log::info;

use crate::{
    block_device::ImageFile,
    fs::Volume,
    utils::fs_size_calculator::{align_to_cluster, max_image_size, min_image_size},
};

/// create a new image file and format it as an empty volume
/// # Params
/// - `image_file_path`: the path of the image file, which must not exist yet
/// - `file_size`: the size of the image file, rounded down to whole clusters
/// and capped at what the allocation table can address
///
/// # Return
/// an [anyhow::Result] type to indicate whether the operation is successful
pub fn mkfs<P>(image_file_path: P, file_size: u64) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    let image_file_path = image_file_path.as_ref();
    // if `file_size` can't even hold the allocation table and the directory, return error
    let size = align_to_cluster(file_size.min(max_image_size()));
    if size < min_image_size() {
        return Err(anyhow!(
            "File size must be at least {}, got {}",
            Byte::from_bytes(min_image_size() as _).get_appropriate_unit(true),
            Byte::from_bytes(file_size as _).get_appropriate_unit(true),
        ));
    }

    let image = ImageFile::create(image_file_path, size)
        .with_context(|| format!("can't create image file {}", image_file_path.display()))?;
    let mut volume = Volume::new(image);
    volume.format()?;
    info!(
        "created {} with {} of free space",
        image_file_path.display(),
        Byte::from_bytes(volume.free_space_bytes()? as _).get_appropriate_unit(true)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{CLUSTER_SIZE, RESERVED_CLUSTERS};
    use std::{path::PathBuf, str::FromStr};

    #[test]
    fn test_mkfs() {
        let tmp_file = PathBuf::from_str("/tmp/rsfs_new_fs.img").unwrap();
        if tmp_file.exists() {
            std::fs::remove_file(&tmp_file).unwrap();
        }
        let file_size = 64 * CLUSTER_SIZE as u64 + 100;

        mkfs(&tmp_file, file_size).unwrap();
        assert_eq!(
            std::fs::metadata(&tmp_file).unwrap().len(),
            64 * CLUSTER_SIZE as u64
        );
        // refuse to overwrite an existing image
        assert!(mkfs(&tmp_file, file_size).is_err());

        let volume = Volume::mount(ImageFile::open(&tmp_file).unwrap()).unwrap();
        assert!(volume.is_valid());
        assert_eq!(volume.list_files().unwrap().count(), 0);
        assert_eq!(
            volume.free_space_bytes().unwrap(),
            ((64 - RESERVED_CLUSTERS) * CLUSTER_SIZE) as u64
        );

        // remove test file
        std::fs::remove_file(&tmp_file).unwrap()
    }

    #[test]
    fn test_mkfs_too_small() {
        let tmp_file = PathBuf::from_str("/tmp/rsfs_too_small.img").unwrap();
        if tmp_file.exists() {
            std::fs::remove_file(&tmp_file).unwrap();
        }
        assert!(mkfs(&tmp_file, min_image_size() - 1).is_err());
        assert!(!tmp_file.exists());
    }
}
