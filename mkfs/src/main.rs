//! Build a file system image, optionally seeded with host files
//! copied into the root directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use fs_lib::{FsParams, DIRSIZ, FSSIZE, LOGSIZE, NINODES};
use kernel_fs::define::fs::ROOTDEV;
use kernel_fs::{File, FileDisk, FileSystem, OpenMode};

#[derive(Parser, Debug)]
#[command(about = "Create a file system image")]
struct Args {
    /// Image file to create (truncated if it exists)
    image: PathBuf,

    /// Host files to copy into the root directory
    files: Vec<PathBuf>,

    /// Total size of the image in blocks
    #[arg(long, default_value_t = FSSIZE as u32)]
    size: u32,

    /// Number of inodes
    #[arg(long, default_value_t = NINODES as u32)]
    inodes: u32,

    /// Number of log blocks, header included
    #[arg(long, default_value_t = LOGSIZE as u32)]
    nlog: u32,
}

/// Name of a host file inside the image.
/// A leading '_' is dropped so that build outputs like `_cat` become `cat`.
fn image_name(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{}: not a valid file name", path.display()))?;
    let name = name.strip_prefix('_').unwrap_or(name);
    if name.is_empty() || name.len() > DIRSIZ {
        bail!("{}: name must be 1 to {} bytes", path.display(), DIRSIZ);
    }
    Ok(name.to_string())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let params = FsParams { size: args.size, ninodes: args.inodes, nlog: args.nlog };

    let disk = Arc::new(
        FileDisk::create(&args.image, params.size)
            .with_context(|| format!("creating {}", args.image.display()))?,
    );
    let fs = FileSystem::format(ROOTDEV, disk.clone(), &params)
        .with_context(|| format!("formatting {}", args.image.display()))?;

    for path in &args.files {
        let name = image_name(path)?;
        let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let file = fs
            .open(&format!("/{}", name), OpenMode::CREATE | OpenMode::WRONLY | OpenMode::TRUNC)
            .with_context(|| format!("creating /{}", name))?;
        let written = file.write(&data).with_context(|| format!("writing /{}", name))?;
        if written != data.len() {
            bail!("/{}: short write, {} of {} bytes", name, written, data.len());
        }
        log::info!("mkfs: /{} ({} bytes, inode {})", name, written, file.inode().inum());
    }

    log::info!("mkfs: {} blocks free", fs.free_blocks());
    drop(fs);
    disk.sync().with_context(|| format!("syncing {}", args.image.display()))?;
    Ok(())
}
