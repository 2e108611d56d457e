use anyhow::{Context, Result};
use prominstall_protocol::{ResolvedArtifact, Version};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::config::InstallerConfig;

const USER_AGENT: &str = concat!("prominstall/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseInfo {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded,
    AlreadyPresent,
}

pub struct ReleaseClient {
    client: reqwest::Client,
}

impl ReleaseClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Newest release's archive for the configured platform.
    pub async fn fetch_latest(&self, config: &InstallerConfig) -> Result<ResolvedArtifact> {
        let url = config.latest_release_url();
        tracing::debug!("fetching release metadata from {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .with_context(|| format!("Failed to reach release API at {}", url))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(anyhow::anyhow!(
                "Release API returned HTTP {} for {}",
                status.as_u16(),
                url
            ));
        }

        let release = response
            .json::<ReleaseInfo>()
            .await
            .context("Failed to parse release metadata")?;

        let suffix = config.archive_suffix();
        let asset = release
            .assets
            .iter()
            .find(|asset| asset.name.ends_with(&suffix))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Release {} has no asset ending in {}",
                    release.tag_name,
                    suffix
                )
            })?;

        artifact_from_url(&asset.browser_download_url, config)
    }

    /// Deterministic URL for `version`, confirmed to exist with a HEAD probe.
    pub async fn resolve_pinned(
        &self,
        config: &InstallerConfig,
        version: &Version,
    ) -> Result<ResolvedArtifact> {
        let url = config.pinned_download_url(&version.to_string());
        tracing::debug!("probing {}", url);

        let response = self
            .client
            .head(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Version {} of {} was not found (HTTP {} for {})",
                version,
                config.product,
                response.status().as_u16(),
                url
            ));
        }

        artifact_from_url(&url, config)
    }

    /// Fetch `url` into `dest` unless `dest` already exists.
    ///
    /// The body is streamed into a `.part` sibling and renamed into place only
    /// once complete; a failed transfer leaves nothing behind.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<DownloadOutcome> {
        if dest.exists() {
            tracing::debug!("{} already present, skipping download", dest.display());
            return Ok(DownloadOutcome::AlreadyPresent);
        }

        let partial = dest.with_extension("part");
        match self.stream_to_file(url, &partial).await {
            Ok(()) => {
                tokio::fs::rename(&partial, dest).await?;
                Ok(DownloadOutcome::Downloaded)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }

    async fn stream_to_file(&self, url: &str, path: &Path) -> Result<()> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Download of {} failed with HTTP {}",
                url,
                response.status().as_u16()
            ));
        }

        let mut file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

/// Derive every artifact name from its download URL.
pub fn artifact_from_url(url: &str, config: &InstallerConfig) -> Result<ResolvedArtifact> {
    let (base, file_name) = url
        .rsplit_once('/')
        .ok_or_else(|| anyhow::anyhow!("Malformed download URL {}", url))?;

    let extracted = file_name
        .strip_suffix(".tar.gz")
        .ok_or_else(|| anyhow::anyhow!("{} is not a .tar.gz archive", file_name))?;

    let version = Version::find_in(file_name)
        .ok_or_else(|| anyhow::anyhow!("No version number in {}", file_name))?;

    Ok(ResolvedArtifact {
        download_url: url.to_string(),
        checksum_url: format!("{}/{}", base, config.checksum_file),
        compressed_file_name: file_name.to_string(),
        extracted_folder_name: extracted.to_string(),
        version,
    })
}

/// A release archive supplied on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    pub path: PathBuf,
    pub version: Version,
    pub platform: String,
    pub extracted_folder_name: String,
}

/// Accept only `<product>-<major>.<minor>.<patch>.<os>-<arch>.tar.gz`.
pub fn parse_local_artifact(path: &Path, config: &InstallerConfig) -> Result<LocalArtifact> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid archive path {}", path.display()))?;

    let pattern = format!(
        r"^{}-(\d+)\.(\d+)\.(\d+)\.([a-z0-9]+-[a-z0-9]+)\.tar\.gz$",
        regex::escape(&config.product)
    );
    let re = regex::Regex::new(&pattern)?;
    let caps = re.captures(file_name).ok_or_else(|| {
        anyhow::anyhow!(
            "Archive name '{}' does not match {}-<major>.<minor>.<patch>.<platform>.tar.gz",
            file_name,
            config.product
        )
    })?;

    let version = Version::new(caps[1].parse()?, caps[2].parse()?, caps[3].parse()?);
    let extracted = file_name.trim_end_matches(".tar.gz").to_string();

    Ok(LocalArtifact {
        path: path.to_path_buf(),
        version,
        platform: caps[4].to_string(),
        extracted_folder_name: extracted,
    })
}
