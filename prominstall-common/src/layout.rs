use anyhow::{Context, Result};
use std::fs::{OpenOptions, Permissions};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

use crate::config::InstallerConfig;
use crate::report;
use crate::users::{self, AccountManager};

const DIR_MODE: u32 = 0o755;
const BINARY_MODE: u32 = 0o755;
const ERROR_LOG_MODE: u32 = 0o640;

/// Lays out directories, files, account and permissions for an install.
pub struct Provisioner<'a> {
    config: &'a InstallerConfig,
    accounts: &'a dyn AccountManager,
}

impl<'a> Provisioner<'a> {
    pub fn new(config: &'a InstallerConfig, accounts: &'a dyn AccountManager) -> Self {
        Self { config, accounts }
    }

    /// Full provisioning from an extracted release folder.
    pub fn provision(&self, extracted: &Path) -> Result<()> {
        self.ensure_directories()?;
        self.copy_release_files(extracted)?;
        if users::ensure_service_user(self.accounts, &self.config.service_user)? {
            report::info(format!("Created service account '{}'", self.config.service_user));
        }
        self.accounts
            .chown_recursive(&self.config.install_dir(), &self.config.service_user)?;
        self.set_binary_modes()?;
        self.ensure_error_log()?;
        self.link_executables()?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.config.root_dir.clone(),
            self.config.install_dir(),
            self.config.log_dir(),
            self.config.data_dir(),
        ] {
            if dir.is_dir() {
                continue;
            }
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            std::fs::set_permissions(&dir, Permissions::from_mode(DIR_MODE))?;
            tracing::debug!("created {}", dir.display());
        }
        Ok(())
    }

    /// Copy the fixed set of release files. The config file is only copied
    /// when there is none yet, so local edits survive upgrades.
    pub fn copy_release_files(&self, extracted: &Path) -> Result<()> {
        let install_dir = self.config.install_dir();
        for name in self
            .config
            .support_files
            .iter()
            .chain(self.config.executables.iter())
        {
            let src = extracted.join(name);
            let dst = install_dir.join(name);
            std::fs::copy(&src, &dst).with_context(|| {
                format!("Failed to copy {} to {}", src.display(), dst.display())
            })?;
        }

        let config_dst = self.config.config_path();
        if config_dst.exists() {
            report::info(format!(
                "Keeping existing configuration {}",
                config_dst.display()
            ));
        } else {
            let config_src = extracted.join(&self.config.config_file);
            std::fs::copy(&config_src, &config_dst).with_context(|| {
                format!("Failed to copy default configuration {}", config_src.display())
            })?;
        }
        Ok(())
    }

    pub fn set_binary_modes(&self) -> Result<()> {
        for binary in self.config.binary_paths() {
            std::fs::set_permissions(&binary, Permissions::from_mode(BINARY_MODE))
                .with_context(|| format!("Failed to set mode on {}", binary.display()))?;
        }
        Ok(())
    }

    /// Creates the error log if missing; existing content is kept.
    pub fn ensure_error_log(&self) -> Result<()> {
        let path = self.config.error_log_path();
        OpenOptions::new()
            .create(true)
            .append(true)
            .mode(ERROR_LOG_MODE)
            .open(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        std::fs::set_permissions(&path, Permissions::from_mode(ERROR_LOG_MODE))?;
        if self.accounts.user_exists(&self.config.service_user) {
            self.accounts.chown_recursive(&path, &self.config.service_user)?;
        }
        Ok(())
    }

    /// Point `<bin_dir>/<name>` at each installed executable.
    pub fn link_executables(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.bin_dir)?;
        for (link, target) in self
            .config
            .symlink_paths()
            .into_iter()
            .zip(self.config.binary_paths())
        {
            match std::fs::symlink_metadata(&link) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    std::fs::remove_file(&link)?;
                }
                Ok(_) => {
                    report::warn(format!(
                        "{} exists and is not a symlink, leaving it alone",
                        link.display()
                    ));
                    continue;
                }
                Err(_) => {}
            }
            std::os::unix::fs::symlink(&target, &link).with_context(|| {
                format!("Failed to link {} -> {}", link.display(), target.display())
            })?;
        }
        Ok(())
    }
}

/// Remove the symlinks created by [`Provisioner::link_executables`].
pub fn unlink_executables(config: &InstallerConfig) -> Result<()> {
    for link in config.symlink_paths() {
        match std::fs::symlink_metadata(&link) {
            Ok(meta) if meta.file_type().is_symlink() => {
                std::fs::remove_file(&link)
                    .with_context(|| format!("Failed to remove {}", link.display()))?;
            }
            Ok(_) => tracing::warn!("{} is not a symlink, not removing", link.display()),
            Err(_) => {}
        }
    }
    Ok(())
}
