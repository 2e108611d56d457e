use anyhow::{Context, Result};
use prominstall_protocol::ChecksumOutcome;
use std::path::Path;

/// Manifest line that refers to exactly `file_name`: the name must start the
/// line or follow whitespace (optionally behind a `*` binary marker) and must
/// end the line.
pub fn find_manifest_entry<'a>(manifest: &'a str, file_name: &str) -> Option<&'a str> {
    manifest.lines().find(|line| {
        let line = line.trim_end_matches('\r');
        let Some(prefix) = line.strip_suffix(file_name) else {
            return false;
        };
        let prefix = prefix.strip_suffix('*').unwrap_or(prefix);
        prefix.is_empty() || prefix.ends_with(char::is_whitespace)
    })
}

/// Check `file` against the entry for its file name in `manifest`.
pub fn verify_checksum(file: &Path, manifest: &Path) -> Result<ChecksumOutcome> {
    let content = match std::fs::read_to_string(manifest) {
        Ok(content) => content,
        Err(_) => return Ok(ChecksumOutcome::NotFound),
    };
    if content.trim().is_empty() {
        return Ok(ChecksumOutcome::NotFound);
    }

    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid artifact path {}", file.display()))?;

    let Some(entry) = find_manifest_entry(&content, file_name) else {
        return Ok(ChecksumOutcome::NotFound);
    };
    let Some(expected) = entry.split_whitespace().next() else {
        return Ok(ChecksumOutcome::NotFound);
    };

    let actual = sha256::try_digest(file)
        .with_context(|| format!("Failed to hash {}", file.display()))?;

    if actual.eq_ignore_ascii_case(expected) {
        Ok(ChecksumOutcome::Success)
    } else {
        tracing::debug!("checksum mismatch for {}: expected {}, got {}", file_name, expected, actual);
        Ok(ChecksumOutcome::Failed)
    }
}

/// Verify and, on any non-success outcome, delete what was verified so that a
/// rerun downloads fresh copies.
pub fn verify_or_discard(file: &Path, manifest: &Path) -> Result<ChecksumOutcome> {
    let outcome = verify_checksum(file, manifest)?;
    match outcome {
        ChecksumOutcome::Success => {}
        ChecksumOutcome::Failed => {
            remove_if_present(file)?;
        }
        ChecksumOutcome::NotFound => {
            remove_if_present(file)?;
            remove_if_present(manifest)?;
        }
    }
    Ok(outcome)
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}
