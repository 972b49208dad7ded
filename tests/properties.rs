//! end-to-end behaviour of a volume on an in-memory disk
use rsfs::{
    block_device::{BlockDevice, MemDisk},
    FileInfo, FsError, OpenMode, Volume, WriteOutcome, CLUSTER_SIZE, RESERVED_CLUSTERS,
    SECTOR_SIZE,
};

fn formatted(clusters: usize) -> Volume<MemDisk> {
    let mut volume = Volume::new(MemDisk::with_clusters(clusters));
    volume.format().expect("format failed");
    volume
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

fn write_whole(volume: &mut Volume<MemDisk>, name: &str, data: &[u8]) -> WriteOutcome {
    let handle = volume.open_file(name, OpenMode::Write).unwrap();
    let outcome = volume.write_file(handle, data).unwrap();
    volume.close_file(handle).unwrap();
    outcome
}

fn read_whole(volume: &mut Volume<MemDisk>, name: &str) -> Vec<u8> {
    let handle = volume.open_file(name, OpenMode::Read).unwrap();
    let mut data = Vec::new();
    let mut buf = [0u8; 1000];
    loop {
        let n = volume.read_file(handle, &mut buf).unwrap();
        data.extend_from_slice(&buf[..n]);
        if n < buf.len() {
            break;
        }
    }
    volume.close_file(handle).unwrap();
    data
}

#[test]
fn initialize_reproduces_persisted_listing() {
    let mut volume = formatted(128);
    volume.create_file("empty").unwrap();
    write_whole(&mut volume, "one", &pattern(10));
    write_whole(&mut volume, "three", &pattern(2 * CLUSTER_SIZE + 1));
    volume.delete_file("empty").unwrap();
    write_whole(&mut volume, "again", &pattern(5));
    let before: Vec<FileInfo> = volume.list_files().unwrap().collect();

    let volume = Volume::mount(volume.into_device()).unwrap();
    let after: Vec<FileInfo> = volume.list_files().unwrap().collect();
    assert_eq!(before, after);
    assert_eq!(after[0].name, "again");
}

#[test]
fn round_trip() {
    let mut volume = formatted(128);
    volume.create_file("a").unwrap();
    let data = pattern(5 * CLUSTER_SIZE + 17);
    assert_eq!(
        write_whole(&mut volume, "a", &data),
        WriteOutcome::Complete(data.len())
    );
    assert_eq!(read_whole(&mut volume, "a"), data);
}

#[test]
fn free_space_is_idempotent() {
    let volume = formatted(100);
    let first = volume.free_space_bytes().unwrap();
    assert_eq!(first, volume.free_space_bytes().unwrap());
    assert_eq!(first, ((100 - RESERVED_CLUSTERS) * CLUSTER_SIZE) as u64);
}

#[test]
fn successor_is_allocated_on_the_next_byte_only() {
    let mut volume = formatted(64);
    let handle = volume.open_file("b", OpenMode::Write).unwrap();
    let after_open = volume.free_space_bytes().unwrap();

    volume.write_file(handle, &pattern(CLUSTER_SIZE)).unwrap();
    assert_eq!(volume.free_space_bytes().unwrap(), after_open);

    volume.write_file(handle, &[1]).unwrap();
    assert_eq!(
        volume.free_space_bytes().unwrap(),
        after_open - CLUSTER_SIZE as u64
    );
    volume.close_file(handle).unwrap();
}

#[test]
fn volume_full_is_a_short_write() {
    const K: usize = 3;
    let mut volume = formatted(RESERVED_CLUSTERS + K);
    let data = pattern((K + 1) * CLUSTER_SIZE);
    let handle = volume.open_file("big", OpenMode::Write).unwrap();
    let outcome = volume.write_file(handle, &data).unwrap();
    assert_eq!(outcome, WriteOutcome::VolumeFull(K * CLUSTER_SIZE));
    assert!(outcome.accepted() < data.len());
    volume.close_file(handle).unwrap();

    let files: Vec<FileInfo> = volume.list_files().unwrap().collect();
    assert_eq!(files[0].size as usize, K * CLUSTER_SIZE);
    assert_eq!(volume.free_space_bytes().unwrap(), 0);
    assert_eq!(read_whole(&mut volume, "big"), &data[..K * CLUSTER_SIZE]);
}

#[test]
fn name_collision() {
    let mut volume = formatted(64);
    volume.create_file("x").unwrap();
    assert!(matches!(
        volume.create_file("x"),
        Err(FsError::AlreadyExists(_))
    ));
    let named_x = volume.list_files().unwrap().filter(|f| f.name == "x").count();
    assert_eq!(named_x, 1);
}

#[test]
fn delete_releases_every_cluster() {
    let mut volume = formatted(64);
    write_whole(&mut volume, "c", &pattern(3 * CLUSTER_SIZE));
    let before = volume.free_space_bytes().unwrap();
    volume.delete_file("c").unwrap();
    assert_eq!(
        volume.free_space_bytes().unwrap(),
        before + 3 * CLUSTER_SIZE as u64
    );
}

#[test]
fn corrupted_reserved_entry_blocks_everything_but_format() {
    let mut volume = formatted(64);
    write_whole(&mut volume, "a", b"hello");
    let mut disk = volume.into_device();

    // entry 0 of the allocation table now claims to be free
    let mut sector = [0u8; SECTOR_SIZE];
    disk.read_sector(0, &mut sector).unwrap();
    sector[..2].copy_from_slice(&1u16.to_le_bytes());
    disk.write_sector(0, &sector).unwrap();

    let mut volume = Volume::new(disk);
    assert!(!volume.initialize().unwrap());
    assert!(matches!(volume.list_files(), Err(FsError::VolumeInvalid)));
    assert!(matches!(volume.free_space_bytes(), Err(FsError::VolumeInvalid)));
    assert!(matches!(volume.create_file("b"), Err(FsError::VolumeInvalid)));
    assert!(matches!(volume.delete_file("a"), Err(FsError::VolumeInvalid)));
    assert!(matches!(
        volume.open_file("a", OpenMode::Read),
        Err(FsError::VolumeInvalid)
    ));
    assert!(matches!(volume.check(), Err(FsError::VolumeInvalid)));

    volume.format().unwrap();
    assert!(volume.is_valid());
    assert_eq!(volume.list_files().unwrap().count(), 0);
    assert!(volume.initialize().unwrap());
}

#[test]
fn only_device_clusters_are_counted() {
    // 40 clusters and a few stray sectors
    let volume = {
        let mut volume = Volume::new(MemDisk::new(40 * 8 + 5));
        volume.format().unwrap();
        volume
    };
    assert_eq!(
        volume.free_space_bytes().unwrap(),
        ((40 - RESERVED_CLUSTERS) * CLUSTER_SIZE) as u64
    );
    assert!(volume.check().unwrap().is_clean());
}
