use anyhow::Result;
use std::path::Path;
use std::process::Command;

const NOLOGIN_SHELL: &str = "/usr/sbin/nologin";

/// Host identity and ownership operations used by the installer.
pub trait AccountManager {
    fn user_exists(&self, username: &str) -> bool;
    /// System account without a home directory or login shell.
    fn create_system_user(&self, username: &str) -> Result<()>;
    fn delete_user(&self, username: &str) -> Result<()>;
    fn chown_recursive(&self, path: &Path, username: &str) -> Result<()>;
}

pub struct SystemAccounts;

impl AccountManager for SystemAccounts {
    fn user_exists(&self, username: &str) -> bool {
        Command::new("id")
            .arg("-u")
            .arg(username)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn create_system_user(&self, username: &str) -> Result<()> {
        let output = Command::new("useradd")
            .arg("--system")
            .arg("--no-create-home")
            .arg("--shell")
            .arg(NOLOGIN_SHELL)
            .arg(username)
            .output()?;

        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "useradd failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }

    fn delete_user(&self, username: &str) -> Result<()> {
        let output = Command::new("userdel").arg(username).output()?;
        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "userdel failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }

    fn chown_recursive(&self, path: &Path, username: &str) -> Result<()> {
        let output = Command::new("chown")
            .arg("-R")
            .arg(format!("{}:{}", username, username))
            .arg(path)
            .output()?;
        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "chown failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }
}

/// Create the account unless it is already there.
pub fn ensure_service_user(accounts: &dyn AccountManager, username: &str) -> Result<bool> {
    if accounts.user_exists(username) {
        return Ok(false);
    }
    accounts.create_system_user(username)?;
    Ok(true)
}
