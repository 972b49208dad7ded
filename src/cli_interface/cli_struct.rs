use clap::Parser;

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum RsfsCli {
    /// create a new image file holding an empty volume
    Mkfs(MkfsArgs),
    /// erase every file of an existing image
    Format(ImageArgs),
    /// list files with their sizes
    Ls(ImageArgs),
    /// show the remaining free space
    Df(ImageArgs),
    /// copy a host file into the volume
    Put(PutArgs),
    /// copy a file out of the volume
    Get(GetArgs),
    /// remove a file
    Rm(FileArgs),
    /// report chain inconsistencies without repairing them
    Check(ImageArgs),
}

///make a new fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "make a new file system")]
pub struct MkfsArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the size of the file system in bytes
    #[clap(short, long)]
    pub size: u64,
}

/// subcommands that only need an image
#[derive(clap::Args, Debug, PartialEq)]
pub struct ImageArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
}

/// subcommands working on one file of the volume
#[derive(clap::Args, Debug, PartialEq)]
pub struct FileArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the file name inside the volume
    #[clap(short, long)]
    pub name: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct PutArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the host file to copy in
    #[clap(short, long)]
    pub source: String,
    /// the file name inside the volume, defaults to the source file name
    #[clap(short, long)]
    pub name: Option<String>,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct GetArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the file name inside the volume
    #[clap(short, long)]
    pub name: String,
    /// the host file to write
    #[clap(short, long)]
    pub dest: String,
}
