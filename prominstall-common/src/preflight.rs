use anyhow::Result;

/// External programs the installer shells out to.
pub const REQUIRED_TOOLS: &[&str] = &["systemctl", "useradd", "userdel", "id", "chown", "pkill"];

pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

pub fn missing_tools(tools: &[&str]) -> Vec<String> {
    tools
        .iter()
        .filter(|tool| which::which(tool).is_err())
        .map(|tool| tool.to_string())
        .collect()
}

/// Superuser first, then every required tool; nothing has been touched yet
/// when either fails.
pub fn check(tools: &[&str]) -> Result<()> {
    if !is_root() {
        return Err(anyhow::anyhow!(
            "This installer must be run as root (try sudo)"
        ));
    }
    let missing = missing_tools(tools);
    if !missing.is_empty() {
        return Err(anyhow::anyhow!(
            "Missing required tools: {}",
            missing.join(", ")
        ));
    }
    Ok(())
}
