use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("version regex compiles"));

/// A `major.minor.patch` release version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// First `major.minor.patch` group found anywhere in `text`.
    pub fn find_in(text: &str) -> Option<Self> {
        let caps = VERSION_RE.captures(text)?;
        Some(Self {
            major: caps[1].parse().ok()?,
            minor: caps[2].parse().ok()?,
            patch: caps[3].parse().ok()?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() != 3 {
            return Err(format!("'{}' is not a major.minor.patch version", s));
        }
        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("'{}' is not a major.minor.patch version", s));
            }
            *slot = part
                .parse()
                .map_err(|_| format!("'{}' has an out of range component", s))?;
        }
        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InstallationState {
    NotInstalled,
    Installed { version: Version },
}

impl InstallationState {
    pub fn version(&self) -> Option<Version> {
        match self {
            Self::NotInstalled => None,
            Self::Installed { version } => Some(*version),
        }
    }
}

/// Where the release archive comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReleaseSelector {
    Latest,
    Pinned { version: Version },
    LocalFile { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArtifact {
    pub download_url: String,
    pub checksum_url: String,
    pub compressed_file_name: String,
    pub extracted_folder_name: String,
    pub version: Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalMode {
    /// Remove executables and service registration, keep config and data.
    Uninstall,
    /// Remove the whole installation root and the service account.
    Purge,
    /// Executable removal ahead of a reinstall the user already confirmed.
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalOutcome {
    Success,
    NotInstalled,
    Cancelled,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumOutcome {
    Success,
    Failed,
    NotFound,
}

/// How the generated unit routes the service's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogBackend {
    Journal,
    File,
}

impl fmt::Display for LogBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Journal => write!(f, "journal"),
            Self::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Proceed,
    Abort,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_in_takes_first_match() {
        let text = "prometheus, version 2.45.0 (branch: HEAD, revision: 8ef767e)\n  go version 1.20.5";
        assert_eq!(Version::find_in(text), Some(Version::new(2, 45, 0)));
    }

    #[test]
    fn test_find_in_without_version() {
        assert_eq!(Version::find_in("command not found"), None);
    }

    #[test]
    fn test_parse_accepts_leading_v() {
        assert_eq!("v2.53.1".parse::<Version>(), Ok(Version::new(2, 53, 1)));
        assert_eq!(" 3.0.0 ".parse::<Version>(), Ok(Version::new(3, 0, 0)));
    }

    #[test]
    fn test_parse_rejects_partial_versions() {
        assert!("2.45".parse::<Version>().is_err());
        assert!("2.45.x".parse::<Version>().is_err());
        assert!("2.45.0.1".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
    }

    #[test]
    fn test_outcomes_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&RemovalOutcome::NotInstalled).unwrap(),
            "\"not_installed\""
        );
        assert_eq!(
            serde_json::to_string(&ChecksumOutcome::NotFound).unwrap(),
            "\"not_found\""
        );
    }

    #[test]
    fn test_installation_state_version() {
        let state = InstallationState::Installed {
            version: Version::new(1, 2, 3),
        };
        assert_eq!(state.version(), Some(Version::new(1, 2, 3)));
        assert_eq!(InstallationState::NotInstalled.version(), None);
    }
}
