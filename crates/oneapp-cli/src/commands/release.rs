// SPDX-License-Identifier: Apache-2.0

//! Release publishing command.

use std::path::Path;

use anyhow::{Context, Result};
use oneapp_core::{DeveloperRepositoryService, ReleaseChannel, layout};

use super::developer_id;
use super::types::ReleaseResult;
use crate::cli::ChannelArg;

/// Release notes from `--notes`, `--notes-file`, or empty.
pub fn resolve_notes(notes: Option<String>, notes_file: Option<&Path>) -> Result<String> {
    if let Some(notes) = notes {
        return Ok(notes);
    }
    match notes_file {
        Some(path) => std::fs::read_to_string(path)
            .map(|s| s.trim_end().to_string())
            .with_context(|| format!("Failed to read release notes from {}", path.display())),
        None => Ok(String::new()),
    }
}

/// Tags a release and records the version in the app's metadata.
pub async fn run_publish(
    service: &DeveloperRepositoryService,
    app_id: &str,
    version: &str,
    notes: &str,
    channel: ChannelArg,
) -> Result<ReleaseResult> {
    let channel: ReleaseChannel = channel.channel.into();
    let developer_id = developer_id(service).await?;
    let release = service
        .publish_release(&developer_id, app_id, version, notes, channel)
        .await?;
    Ok(ReleaseResult {
        app_id: app_id.to_string(),
        version: layout::release_version(version)?.to_string(),
        channel,
        release,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_notes_flag_wins() {
        let notes = resolve_notes(Some("Fixes".to_string()), None).unwrap();
        assert_eq!(notes, "Fixes");
    }

    #[test]
    fn test_notes_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "- Faster sync\n").unwrap();
        let notes = resolve_notes(None, Some(file.path())).unwrap();
        assert_eq!(notes, "- Faster sync");
    }

    #[test]
    fn test_notes_missing_file() {
        let err = resolve_notes(None, Some(Path::new("/nonexistent/notes.md"))).unwrap_err();
        assert!(err.to_string().contains("release notes"));
    }

    #[test]
    fn test_no_notes() {
        assert_eq!(resolve_notes(None, None).unwrap(), "");
    }
}
