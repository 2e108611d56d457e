use anyhow::{Context, Result};
use prominstall_protocol::{Decision, InstallationState, RemovalMode, RemovalOutcome, Version};
use std::path::Path;
use std::process::Command;

use crate::archive;
use crate::config::InstallerConfig;
use crate::layout;
use crate::prompt::{self, Prompter};
use crate::report;
use crate::systemd::ServiceManager;
use crate::users::AccountManager;

/// Ask the installed binary for its version. Anything unexpected means
/// "not installed"; this never fails.
pub fn resolve_current_version(binary: &Path) -> InstallationState {
    let output = match Command::new(binary).arg("--version").output() {
        Ok(output) => output,
        Err(_) => return InstallationState::NotInstalled,
    };

    // some releases print the banner on stderr
    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).to_string()
    };

    text.lines()
        .next()
        .and_then(Version::find_in)
        .map(|version| InstallationState::Installed { version })
        .unwrap_or(InstallationState::NotInstalled)
}

/// Same-version installs need an explicit reinstall confirmation.
pub fn compare_and_confirm(
    current: InstallationState,
    target: Version,
    product: &str,
    prompter: &mut dyn Prompter,
) -> Result<Decision> {
    match current {
        InstallationState::Installed { version } if version == target => {
            let question = format!("{} {} is already installed. Reinstall it?", product, version);
            if prompt::confirm(prompter, &question)? {
                Ok(Decision::Proceed)
            } else {
                Ok(Decision::Abort)
            }
        }
        InstallationState::Installed { version } => {
            report::info(format!(
                "Replacing installed {} {} with {}",
                product, version, target
            ));
            Ok(Decision::Proceed)
        }
        InstallationState::NotInstalled => Ok(Decision::Proceed),
    }
}

/// Drives removal of an existing installation.
pub struct Remover<'a> {
    config: &'a InstallerConfig,
    services: &'a dyn ServiceManager,
    accounts: &'a dyn AccountManager,
}

impl<'a> Remover<'a> {
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

    /// Safe to call repeatedly: with nothing installed it returns
    /// `NotInstalled` without prompting or touching anything, and a declined
    /// confirmation returns `Cancelled` before the first mutation.
    pub fn remove_existing(
        &self,
        mode: RemovalMode,
        prompter: &mut dyn Prompter,
    ) -> Result<RemovalOutcome> {
        let install_dir = self.config.install_dir();
        if !install_dir.is_dir() {
            return Ok(RemovalOutcome::NotInstalled);
        }

        match mode {
            RemovalMode::Purge => {
                let question = format!(
                    "Purge {} including all data in {}? This cannot be undone",
                    self.config.product,
                    self.config.data_dir().display()
                );
                if !prompt::confirm(prompter, &question)? {
                    return Ok(RemovalOutcome::Cancelled);
                }
                self.stop_service();
                if self.config.data_dir().is_dir() {
                    self.offer_backup(prompter)?;
                    std::fs::remove_dir_all(&install_dir)
                        .with_context(|| format!("Failed to remove {}", install_dir.display()))?;
                    report::info(format!("Removed {}", install_dir.display()));
                    self.delete_account();
                } else {
                    report::warn(format!(
                        "No data directory at {}, leaving {} in place",
                        self.config.data_dir().display(),
                        install_dir.display()
                    ));
                }
            }
            RemovalMode::Uninstall => {
                let question = format!(
                    "Uninstall {}? Configuration and data are kept",
                    self.config.product
                );
                if !prompt::confirm(prompter, &question)? {
                    return Ok(RemovalOutcome::Cancelled);
                }
                if !self.config.main_binary().exists() {
                    return Ok(RemovalOutcome::NotFound);
                }
                self.stop_service();
                self.offer_backup(prompter)?;
                self.remove_binaries()?;
            }
            RemovalMode::Replace => {
                self.stop_service();
                if self.config.main_binary().exists() {
                    self.offer_backup(prompter)?;
                    self.remove_binaries()?;
                }
            }
        }

        layout::unlink_executables(self.config)?;
        self.remove_unit_file()?;
        if let Err(e) = self.services.daemon_reload() {
            report::warn(format!("Failed to reload service units: {}", e));
        }

        Ok(RemovalOutcome::Success)
    }

    fn stop_service(&self) {
        let service = self.config.service_name();
        if !self.services.is_active(&service) {
            return;
        }
        report::info(format!("Stopping {}", service));
        if let Err(e) = self.services.stop(&service) {
            report::warn(format!("Failed to stop {}: {}", service, e));
        }
        if let Err(e) = self.services.disable(&service) {
            report::warn(format!("Failed to disable {}: {}", service, e));
        }
        if let Err(e) = self
            .services
            .terminate_processes(&self.config.service_user, &self.config.main_binary())
        {
            report::warn(format!("Failed to terminate leftover processes: {}", e));
        }
    }

    fn offer_backup(&self, prompter: &mut dyn Prompter) -> Result<()> {
        let install_dir = self.config.install_dir();
        let question = format!("Back up {} before removing it?", install_dir.display());
        if !prompt::confirm(prompter, &question)? {
            return Ok(());
        }
        match archive::create_backup(&install_dir, &self.config.product, chrono::Local::now()) {
            Ok(path) => report::success(format!("Backup written to {}", path.display())),
            Err(e) => report::warn(format!("Backup failed: {:#}", e)),
        }
        Ok(())
    }

    fn remove_binaries(&self) -> Result<()> {
        for binary in self.config.binary_paths() {
            match std::fs::remove_file(&binary) {
                Ok(()) => report::info(format!("Removed {}", binary.display())),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to remove {}", binary.display()))
                }
            }
        }
        Ok(())
    }

    fn remove_unit_file(&self) -> Result<()> {
        let unit_path = self.config.unit_path();
        match std::fs::remove_file(&unit_path) {
            Ok(()) => {
                report::info(format!("Removed {}", unit_path.display()));
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", unit_path.display())),
        }
    }

    fn delete_account(&self) {
        let user = &self.config.service_user;
        if !self.accounts.user_exists(user) {
            return;
        }
        match self.accounts.delete_user(user) {
            Ok(()) => report::info(format!("Removed service account '{}'", user)),
            Err(e) => report::warn(format!("Failed to remove service account '{}': {}", user, e)),
        }
    }
}
