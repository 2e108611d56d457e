use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

/// Unpack a `.tar.gz` archive into `dest`.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file =
        File::open(archive).with_context(|| format!("Failed to open {}", archive.display()))?;
    std::fs::create_dir_all(dest)?;
    let mut tar = Archive::new(GzDecoder::new(file));
    tar.set_preserve_permissions(true);
    tar.unpack(dest)
        .with_context(|| format!("Failed to extract {}", archive.display()))?;
    Ok(())
}

/// `<product>_backup_<YYYY.MM.DD_HH-MM-SS>.tar.gz`
pub fn backup_file_name(product: &str, at: DateTime<Local>) -> String {
    format!("{}_backup_{}.tar.gz", product, at.format("%Y.%m.%d_%H-%M-%S"))
}

/// Snapshot `install_dir` into a compressed archive next to it.
///
/// The archive is written to the parent of `install_dir` so it never ends up
/// inside the tree being archived.
pub fn create_backup(install_dir: &Path, product: &str, at: DateTime<Local>) -> Result<PathBuf> {
    let parent = install_dir
        .parent()
        .ok_or_else(|| anyhow::anyhow!("{} has no parent directory", install_dir.display()))?;
    let backup_path = parent.join(backup_file_name(product, at));

    let file = File::create(&backup_path)
        .with_context(|| format!("Failed to create {}", backup_path.display()))?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);
    builder
        .append_dir_all(product, install_dir)
        .with_context(|| format!("Failed to archive {}", install_dir.display()))?;
    builder.into_inner()?.finish()?;

    Ok(backup_path)
}
