use anyhow::{Context, Result};
use std::fs::{DirBuilder, Permissions};
use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

const STAGING_MODE: u32 = 0o700;

/// Switches the process into a working directory and switches back when dropped,
/// on every exit path including `?` early returns and panics.
///
/// Downloads found in the directory are reused without re-fetching, so the
/// directory must belong to the current user and be closed to everyone else.
pub struct WorkingDirGuard {
    original: Option<PathBuf>,
    current: PathBuf,
}

impl WorkingDirGuard {
    pub fn enter(dir: &Path) -> Result<Self> {
        // a vanished working directory has nothing to restore
        let original = match std::env::current_dir() {
            Ok(original) => Some(original),
            Err(e) => {
                tracing::debug!("current directory unavailable: {}", e);
                None
            }
        };

        if std::fs::symlink_metadata(dir).is_err() {
            DirBuilder::new()
                .recursive(true)
                .mode(STAGING_MODE)
                .create(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            std::fs::set_permissions(dir, Permissions::from_mode(STAGING_MODE))?;
        }
        check_private(dir)?;

        std::env::set_current_dir(dir)
            .with_context(|| format!("Failed to enter {}", dir.display()))?;
        tracing::debug!("entered {}", dir.display());
        Ok(Self {
            original,
            current: dir.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.current
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        let Some(original) = &self.original else {
            return;
        };
        if let Err(e) = std::env::set_current_dir(original) {
            tracing::warn!("Failed to restore {}: {}", original.display(), e);
        }
    }
}

/// Refuse symlinks, directories owned by another user and directories
/// writable by group or others.
pub fn check_private(dir: &Path) -> Result<()> {
    let meta = std::fs::symlink_metadata(dir)
        .with_context(|| format!("Failed to inspect {}", dir.display()))?;
    if !meta.is_dir() {
        return Err(anyhow::anyhow!(
            "{} is not a directory (symlinks are not accepted)",
            dir.display()
        ));
    }

    let euid = unsafe { libc::geteuid() };
    if meta.uid() != euid {
        return Err(anyhow::anyhow!(
            "{} is owned by uid {}, expected {}; refusing to reuse its contents",
            dir.display(),
            meta.uid(),
            euid
        ));
    }
    if meta.mode() & 0o022 != 0 {
        return Err(anyhow::anyhow!(
            "{} is writable by other users (mode {:o}); refusing to reuse its contents",
            dir.display(),
            meta.mode() & 0o777
        ));
    }
    Ok(())
}
