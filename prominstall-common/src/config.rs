use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/prominstall/config.toml";
pub const API_URL_ENV: &str = "PROMINSTALL_API_URL";

/// Everything the installer needs to know about the managed product and the host.
///
/// Loaded once at startup and passed by reference to every component; derived
/// paths are computed from it rather than kept as separate globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    pub product: String,
    pub executables: Vec<String>,
    pub support_files: Vec<String>,
    pub config_file: String,
    pub repository: String,
    pub api_url: String,
    pub download_url: String,
    pub checksum_file: String,
    pub platform: String,
    pub root_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub unit_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub service_user: String,
    pub description: String,
    /// `ExecStart` arguments; `{config}`, `{data}` and `{port}` are substituted.
    pub exec_args: Vec<String>,
    pub default_port: u16,
    pub min_port: u16,
    pub journal_threshold: u32,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            product: "prometheus".to_string(),
            executables: vec!["prometheus".to_string(), "promtool".to_string()],
            support_files: vec!["LICENSE".to_string(), "NOTICE".to_string()],
            config_file: "prometheus.yml".to_string(),
            repository: "prometheus/prometheus".to_string(),
            api_url: "https://api.github.com".to_string(),
            download_url: "https://github.com".to_string(),
            checksum_file: "sha256sums.txt".to_string(),
            platform: host_platform(),
            root_dir: PathBuf::from("/opt/monitoring"),
            bin_dir: PathBuf::from("/usr/local/bin"),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            staging_dir: PathBuf::from("/var/cache/prominstall"),
            service_user: "prometheus".to_string(),
            description: "Prometheus monitoring server".to_string(),
            exec_args: vec![
                "--config.file={config}".to_string(),
                "--storage.tsdb.path={data}".to_string(),
                "--web.listen-address=0.0.0.0:{port}".to_string(),
            ],
            default_port: 9090,
            min_port: 2000,
            journal_threshold: 240,
        }
    }
}

impl InstallerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: InstallerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Explicit path must load; the default path is optional.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH)?,
            None => Self::default(),
        };
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.api_url = url;
        }
        Ok(config)
    }

    pub fn install_dir(&self) -> PathBuf {
        self.root_dir.join(&self.product)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.install_dir().join("log")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.install_dir().join("data")
    }

    pub fn config_path(&self) -> PathBuf {
        self.install_dir().join(&self.config_file)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.log_dir().join("error.log")
    }

    pub fn combined_log_path(&self) -> PathBuf {
        self.log_dir().join(format!("{}.log", self.product))
    }

    /// The executable whose `--version` output identifies the install.
    pub fn main_binary(&self) -> PathBuf {
        self.install_dir().join(&self.product)
    }

    pub fn binary_paths(&self) -> Vec<PathBuf> {
        self.executables
            .iter()
            .map(|name| self.install_dir().join(name))
            .collect()
    }

    pub fn symlink_paths(&self) -> Vec<PathBuf> {
        self.executables
            .iter()
            .map(|name| self.bin_dir.join(name))
            .collect()
    }

    pub fn service_name(&self) -> String {
        format!("{}.service", self.product)
    }

    pub fn unit_path(&self) -> PathBuf {
        self.unit_dir.join(self.service_name())
    }

    pub fn archive_suffix(&self) -> String {
        format!(".{}.tar.gz", self.platform)
    }

    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/releases/latest",
            self.api_url.trim_end_matches('/'),
            self.repository
        )
    }

    pub fn pinned_download_url(&self, version: &str) -> String {
        format!(
            "{}/{}/releases/download/v{}/{}-{}{}",
            self.download_url.trim_end_matches('/'),
            self.repository,
            version,
            self.product,
            version,
            self.archive_suffix()
        )
    }
}

/// Release platform tag for the running host, e.g. `linux-amd64`.
pub fn host_platform() -> String {
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "arm" => "armv7",
        "x86" => "386",
        other => other,
    };
    format!("{}-{}", std::env::consts::OS, arch)
}
