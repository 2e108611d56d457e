use anyhow::Result;
use prominstall_protocol::LogBackend;
use std::path::Path;
use std::process::{Command, ExitStatus};

/// Host service-manager operations used by the installer.
pub trait ServiceManager {
    fn is_active(&self, service: &str) -> bool;
    fn stop(&self, service: &str) -> Result<()>;
    fn disable(&self, service: &str) -> Result<()>;
    fn enable(&self, service: &str) -> Result<()>;
    fn start(&self, service: &str) -> Result<()>;
    fn daemon_reload(&self) -> Result<()>;
    fn status(&self, service: &str) -> Result<String>;
    /// Numeric major version reported by the manager.
    fn version(&self) -> Result<u32>;
    /// Kill whatever is still running as `user` or from `binary`.
    fn terminate_processes(&self, user: &str, binary: &Path) -> Result<()>;
}

pub struct Systemctl;

impl Systemctl {
    fn execute(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("systemctl").args(args).output()?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(anyhow::anyhow!(
                "systemctl {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}

impl ServiceManager for Systemctl {
    fn is_active(&self, service: &str) -> bool {
        Command::new("systemctl")
            .args(["is-active", "--quiet", service])
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn stop(&self, service: &str) -> Result<()> {
        self.execute(&["stop", service]).map(|_| ())
    }

    fn disable(&self, service: &str) -> Result<()> {
        self.execute(&["disable", service]).map(|_| ())
    }

    fn enable(&self, service: &str) -> Result<()> {
        self.execute(&["enable", service]).map(|_| ())
    }

    fn start(&self, service: &str) -> Result<()> {
        self.execute(&["start", service]).map(|_| ())
    }

    fn daemon_reload(&self) -> Result<()> {
        self.execute(&["daemon-reload"]).map(|_| ())
    }

    fn status(&self, service: &str) -> Result<String> {
        self.execute(&["status", "--no-pager", service])
    }

    fn version(&self) -> Result<u32> {
        let output = self.execute(&["--version"])?;
        parse_manager_version(&output)
            .ok_or_else(|| anyhow::anyhow!("Unrecognised systemctl --version output"))
    }

    fn terminate_processes(&self, user: &str, binary: &Path) -> Result<()> {
        terminate_with(user, binary, |args| Command::new("pkill").args(args).status())
    }
}

/// Runs the by-user and by-binary kill passes; both always run and their
/// failures are reported together.
pub(crate) fn terminate_with(
    user: &str,
    binary: &Path,
    mut run: impl FnMut(&[&str; 2]) -> std::io::Result<ExitStatus>,
) -> Result<()> {
    let binary = binary.to_string_lossy();
    let mut failures = Vec::new();
    for args in [["-u", user], ["-f", &*binary]] {
        match run(&args) {
            // pkill exits 1 when nothing matched
            Ok(status) if status.success() || status.code() == Some(1) => {}
            Ok(status) => failures.push(format!("pkill {} exited with {}", args.join(" "), status)),
            Err(e) => failures.push(format!("pkill {}: {}", args.join(" "), e)),
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(failures.join("; ")))
    }
}

/// `systemd 252 (252.22-1~deb12u1)` -> 252
pub fn parse_manager_version(output: &str) -> Option<u32> {
    let first = output.lines().next()?;
    let mut words = first.split_whitespace();
    if words.next()? != "systemd" {
        return None;
    }
    words.next()?.parse().ok()
}

/// Older managers can only route output to the journal; newer ones support
/// appending straight to a file.
pub fn select_log_backend(manager_version: u32, threshold: u32) -> LogBackend {
    if manager_version < threshold {
        LogBackend::Journal
    } else {
        LogBackend::File
    }
}
