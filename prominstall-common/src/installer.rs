use anyhow::{Context, Result};
use prominstall_protocol::{
    ChecksumOutcome, Decision, InstallationState, LogBackend, ReleaseSelector, RemovalMode,
    RemovalOutcome, Version,
};
use std::path::{Path, PathBuf};

use crate::archive;
use crate::checksum;
use crate::config::InstallerConfig;
use crate::layout::Provisioner;
use crate::prompt::{self, Prompter};
use crate::release::{self, DownloadOutcome, ReleaseClient};
use crate::removal::{self, Remover};
use crate::report;
use crate::systemd::{self, ServiceManager};
use crate::unit;
use crate::users::AccountManager;
use crate::workdir::WorkingDirGuard;

/// How a run ended when it did not fail. Every variant exits with status 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Installed { version: Version, port: u16 },
    ReinstallDeclined { version: Version },
    Removed,
    NothingToRemove,
    Cancelled,
}

pub struct Installer<'a> {
    config: &'a InstallerConfig,
    services: &'a dyn ServiceManager,
    accounts: &'a dyn AccountManager,
}

impl<'a> Installer<'a> {
    pub fn new(
        config: &'a InstallerConfig,
        services: &'a dyn ServiceManager,
        accounts: &'a dyn AccountManager,
    ) -> Self {
        Self {
            config,
            services,
            accounts,
        }
    }

    /// Install the selected release, replacing whatever is there.
    pub async fn install(
        &self,
        selector: ReleaseSelector,
        client: &ReleaseClient,
        prompter: &mut dyn Prompter,
    ) -> Result<RunOutcome> {
        let artifact = match selector {
            ReleaseSelector::LocalFile { path } => {
                return self.install_from_local(&path, prompter);
            }
            ReleaseSelector::Pinned { version } => {
                let current = removal::resolve_current_version(&self.config.main_binary());
                if self.confirm_target(current, version, prompter)? == Decision::Abort {
                    return Ok(self.declined(version));
                }
                client.resolve_pinned(self.config, &version).await?
            }
            ReleaseSelector::Latest => {
                let artifact = client.fetch_latest(self.config).await?;
                report::info(format!(
                    "Latest {} release is {}",
                    self.config.product, artifact.version
                ));
                let current = removal::resolve_current_version(&self.config.main_binary());
                if self.confirm_target(current, artifact.version, prompter)? == Decision::Abort {
                    return Ok(self.declined(artifact.version));
                }
                artifact
            }
        };

        let port = prompt::select_port(prompter, self.config)?;

        let staging = WorkingDirGuard::enter(&self.config.staging_dir)?;
        let archive_path = staging.path().join(&artifact.compressed_file_name);
        let manifest_path = staging.path().join(format!(
            "{}.{}",
            artifact.extracted_folder_name, self.config.checksum_file
        ));

        for (url, dest) in [
            (&artifact.download_url, &archive_path),
            (&artifact.checksum_url, &manifest_path),
        ] {
            match client.download(url, dest).await? {
                DownloadOutcome::Downloaded => report::info(format!("Downloaded {}", url)),
                DownloadOutcome::AlreadyPresent => {
                    report::info(format!("Reusing {}", dest.display()))
                }
            }
        }

        match checksum::verify_or_discard(&archive_path, &manifest_path)? {
            ChecksumOutcome::Success => report::success(format!(
                "Checksum verified for {}",
                artifact.compressed_file_name
            )),
            ChecksumOutcome::Failed => {
                return Err(anyhow::anyhow!(
                    "Checksum mismatch for {}; the download was removed, run the installer again",
                    artifact.compressed_file_name
                ));
            }
            ChecksumOutcome::NotFound => {
                return Err(anyhow::anyhow!(
                    "No checksum entry for {} in {}; downloaded files were removed",
                    artifact.compressed_file_name,
                    artifact.checksum_url
                ));
            }
        }

        let extracted = self.extract(
            &archive_path,
            staging.path(),
            &artifact.extracted_folder_name,
        )?;
        self.finish(&extracted, artifact.version, port, prompter)
    }

    /// Install from an archive the user already has; the file name is
    /// validated before anything else happens.
    pub fn install_from_local(
        &self,
        archive_path: &Path,
        prompter: &mut dyn Prompter,
    ) -> Result<RunOutcome> {
        let local = release::parse_local_artifact(archive_path, self.config)?;
        if !archive_path.is_file() {
            return Err(anyhow::anyhow!(
                "Archive {} does not exist",
                archive_path.display()
            ));
        }
        if local.platform != self.config.platform {
            report::warn(format!(
                "Archive is built for {}, this host is {}",
                local.platform, self.config.platform
            ));
        }

        let current = removal::resolve_current_version(&self.config.main_binary());
        if self.confirm_target(current, local.version, prompter)? == Decision::Abort {
            return Ok(self.declined(local.version));
        }

        let port = prompt::select_port(prompter, self.config)?;
        let archive_path = std::fs::canonicalize(archive_path)?;

        let staging = WorkingDirGuard::enter(&self.config.staging_dir)?;
        let extracted =
            self.extract(&archive_path, staging.path(), &local.extracted_folder_name)?;
        self.finish(&extracted, local.version, port, prompter)
    }

    pub fn remove(&self, mode: RemovalMode, prompter: &mut dyn Prompter) -> Result<RunOutcome> {
        let remover = Remover::new(self.config, self.services, self.accounts);
        let outcome = remover.remove_existing(mode, prompter)?;
        match outcome {
            RemovalOutcome::Success => {
                report::success(format!("{} removed", self.config.product));
                Ok(RunOutcome::Removed)
            }
            RemovalOutcome::NotInstalled => {
                report::warn(format!(
                    "{} is not installed at {}",
                    self.config.product,
                    self.config.install_dir().display()
                ));
                Ok(RunOutcome::NothingToRemove)
            }
            RemovalOutcome::Cancelled => {
                report::warn("Cancelled, nothing was changed");
                Ok(RunOutcome::Cancelled)
            }
            RemovalOutcome::NotFound => {
                report::warn(format!(
                    "No {} binary found at {}",
                    self.config.product,
                    self.config.main_binary().display()
                ));
                Ok(RunOutcome::NothingToRemove)
            }
        }
    }

    fn confirm_target(
        &self,
        current: InstallationState,
        target: Version,
        prompter: &mut dyn Prompter,
    ) -> Result<Decision> {
        removal::compare_and_confirm(current, target, &self.config.product, prompter)
    }

    fn declined(&self, version: Version) -> RunOutcome {
        report::warn(format!(
            "Keeping the installed {} {}",
            self.config.product, version
        ));
        RunOutcome::ReinstallDeclined { version }
    }

    fn extract(&self, archive_path: &Path, staging: &Path, folder: &str) -> Result<PathBuf> {
        let extracted = staging.join(folder);
        if extracted.exists() {
            std::fs::remove_dir_all(&extracted)?;
        }
        archive::extract_archive(archive_path, staging)?;
        if !extracted.is_dir() {
            return Err(anyhow::anyhow!(
                "{} did not contain {}/",
                archive_path.display(),
                folder
            ));
        }
        Ok(extracted)
    }

    /// Shared tail of both install paths: replace, provision, activate.
    fn finish(
        &self,
        extracted: &Path,
        version: Version,
        port: u16,
        prompter: &mut dyn Prompter,
    ) -> Result<RunOutcome> {
        let remover = Remover::new(self.config, self.services, self.accounts);
        match remover.remove_existing(RemovalMode::Replace, prompter)? {
            RemovalOutcome::Success | RemovalOutcome::NotInstalled => {}
            RemovalOutcome::NotFound => {
                report::info("No previous binaries to replace");
            }
            RemovalOutcome::Cancelled => {
                report::warn("Cancelled, nothing was changed");
                return Ok(RunOutcome::Cancelled);
            }
        }

        Provisioner::new(self.config, self.accounts)
            .provision(extracted)
            .context("Failed to lay out the installation")?;

        let backend = self.log_backend();
        let content = unit::render_unit(self.config, port, backend);
        unit::activate_unit(self.config, self.services, &content)?;

        if let Err(e) = std::fs::remove_dir_all(extracted) {
            tracing::warn!("Failed to clean up {}: {}", extracted.display(), e);
        }

        self.summary(version, port, backend);
        Ok(RunOutcome::Installed { version, port })
    }

    fn log_backend(&self) -> LogBackend {
        match self.services.version() {
            Ok(manager_version) => {
                systemd::select_log_backend(manager_version, self.config.journal_threshold)
            }
            Err(e) => {
                report::warn(format!(
                    "Could not determine service manager version ({}), logging to the journal",
                    e
                ));
                LogBackend::Journal
            }
        }
    }

    fn summary(&self, version: Version, port: u16, backend: LogBackend) {
        report::success(format!("{} {} installed", self.config.product, version));
        println!("    install dir : {}", self.config.install_dir().display());
        println!("    config      : {}", self.config.config_path().display());
        println!("    data        : {}", self.config.data_dir().display());
        println!("    unit        : {}", self.config.unit_path().display());
        match backend {
            LogBackend::Journal => println!(
                "    logs        : journalctl -u {}",
                self.config.service_name()
            ),
            LogBackend::File => println!(
                "    logs        : {}",
                self.config.combined_log_path().display()
            ),
        }
        println!("    listening   : http://localhost:{}", port);
    }
}
