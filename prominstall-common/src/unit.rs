use anyhow::{Context, Result};
use prominstall_protocol::LogBackend;

use crate::config::InstallerConfig;
use crate::report;
use crate::systemd::ServiceManager;

/// At most this many restarts within [`START_LIMIT_INTERVAL_SECS`]; after that
/// the unit stays failed.
pub const START_LIMIT_BURST: u32 = 3;
pub const START_LIMIT_INTERVAL_SECS: u32 = 30;
pub const RESTART_SEC: u32 = 5;

pub fn render_unit(config: &InstallerConfig, port: u16, backend: LogBackend) -> String {
    let install_dir = config.install_dir();
    let config_path = config.config_path();
    let data_dir = config.data_dir();

    let mut exec_start = config.main_binary().display().to_string();
    for arg in &config.exec_args {
        let arg = arg
            .replace("{config}", &config_path.display().to_string())
            .replace("{data}", &data_dir.display().to_string())
            .replace("{port}", &port.to_string());
        exec_start.push_str(" \\\n    ");
        exec_start.push_str(&arg);
    }

    let output = match backend {
        LogBackend::Journal => "StandardOutput=journal\nStandardError=journal".to_string(),
        LogBackend::File => format!(
            "StandardOutput=append:{}\nStandardError=append:{}",
            config.combined_log_path().display(),
            config.error_log_path().display()
        ),
    };

    format!(
        r#"[Unit]
Description={description}
Wants=network-online.target
After=network-online.target
StartLimitIntervalSec={interval}
StartLimitBurst={burst}

[Service]
Type=simple
User={user}
Group={user}
WorkingDirectory={install_dir}
ExecStart={exec_start}
Restart=on-failure
RestartSec={restart_sec}
{output}

[Install]
WantedBy=multi-user.target
"#,
        description = config.description,
        interval = START_LIMIT_INTERVAL_SECS,
        burst = START_LIMIT_BURST,
        user = config.service_user,
        install_dir = install_dir.display(),
        exec_start = exec_start,
        restart_sec = RESTART_SEC,
        output = output,
    )
}

/// Write the unit, then reload, enable, start and report status. Any failure
/// aborts the install.
pub fn activate_unit(
    config: &InstallerConfig,
    services: &dyn ServiceManager,
    content: &str,
) -> Result<()> {
    let unit_path = config.unit_path();
    let service = config.service_name();

    if let Some(parent) = unit_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&unit_path, content)
        .with_context(|| format!("Failed to write {}", unit_path.display()))?;
    report::info(format!("Wrote service unit {}", unit_path.display()));

    services.daemon_reload().context("Failed to reload service units")?;
    services
        .enable(&service)
        .with_context(|| format!("Failed to enable {}", service))?;
    services
        .start(&service)
        .with_context(|| format!("Failed to start {}", service))?;

    let status = services
        .status(&service)
        .with_context(|| format!("{} did not come up", service))?;
    for line in status.lines().take(3) {
        println!("    {}", line.trim());
    }
    report::success(format!("{} is running", service));
    Ok(())
}
