use std::path::Path;

use anyhow::{bail, Context};
use byte_unit::Byte;
use clap::Parser;
use rsfs::{
    block_device::ImageFile,
    cli_interface::{GetArgs, PutArgs, RsfsCli},
    OpenMode, Volume, WriteOutcome, CLUSTER_SIZE,
};

/// open an image and load its metadata,
/// refusing to go on if the allocation table is corrupted
fn mount<P: AsRef<Path>>(image_file_path: P) -> anyhow::Result<Volume<ImageFile>> {
    let image_file_path = image_file_path.as_ref();
    let image = ImageFile::open(image_file_path)
        .with_context(|| format!("can't open image file {}", image_file_path.display()))?;
    let volume = Volume::mount(image)?;
    if !volume.is_valid() {
        bail!(
            "{} is corrupted or not formatted, run `rsfs format` first",
            image_file_path.display()
        );
    }
    Ok(volume)
}

fn put(args: PutArgs) -> anyhow::Result<()> {
    let data = std::fs::read(&args.source)
        .with_context(|| format!("can't read host file {}", args.source))?;
    let name = match args.name {
        Some(name) => name,
        None => Path::new(&args.source)
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .context("source has no usable file name, pass --name")?,
    };
    let mut volume = mount(&args.image_file_path)?;
    let handle = volume.open_file(&name, OpenMode::Write)?;
    let outcome = volume.write_file(handle, &data)?;
    volume.close_file(handle)?;
    if let WriteOutcome::VolumeFull(accepted) = outcome {
        bail!(
            "volume is full, only {accepted} of {} bytes of {name} were stored",
            data.len()
        );
    }
    Ok(())
}

fn get(args: GetArgs) -> anyhow::Result<()> {
    let mut volume = mount(&args.image_file_path)?;
    let handle = volume.open_file(&args.name, OpenMode::Read)?;
    let mut data = Vec::new();
    let mut buf = vec![0u8; CLUSTER_SIZE];
    loop {
        let n = volume.read_file(handle, &mut buf)?;
        data.extend_from_slice(&buf[..n]);
        if n < buf.len() {
            break;
        }
    }
    volume.close_file(handle)?;
    std::fs::write(&args.dest, data)
        .with_context(|| format!("can't write host file {}", args.dest))?;
    Ok(())
}

/// a CLI interface to users to create an image,
/// or to move files in and out of it
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = RsfsCli::parse();
    match args {
        RsfsCli::Mkfs(args) => {
            rsfs::mkfs::mkfs(args.image_file_path, args.size)?;
        }
        RsfsCli::Format(args) => {
            let image = ImageFile::open(&args.image_file_path)?;
            Volume::new(image).format()?;
        }
        RsfsCli::Ls(args) => {
            let volume = mount(&args.image_file_path)?;
            for file in volume.list_files()? {
                println!("{}\t\t{}", file.name, file.size);
            }
        }
        RsfsCli::Df(args) => {
            let volume = mount(&args.image_file_path)?;
            let free = volume.free_space_bytes()?;
            println!(
                "{free} bytes free ({})",
                Byte::from_bytes(free as _).get_appropriate_unit(true)
            );
        }
        RsfsCli::Put(args) => put(args)?,
        RsfsCli::Get(args) => get(args)?,
        RsfsCli::Rm(args) => {
            let mut volume = mount(&args.image_file_path)?;
            volume.delete_file(&args.name)?;
        }
        RsfsCli::Check(args) => {
            let volume = mount(&args.image_file_path)?;
            let report = volume.check()?;
            println!(
                "{} files, {} clusters in use",
                report.files, report.used_clusters
            );
            for problem in &report.problems {
                println!("{problem:?}");
            }
            if !report.lost_clusters.is_empty() {
                println!("lost clusters: {:?}", report.lost_clusters);
            }
            if !report.is_clean() {
                bail!("volume is inconsistent");
            }
        }
    }
    Ok(())
}
