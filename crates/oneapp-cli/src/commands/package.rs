// SPDX-License-Identifier: Apache-2.0

//! Package upload command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use oneapp_core::{DeveloperRepositoryService, PlatformType, ReleaseChannel};
use tracing::debug;

use super::developer_id;
use super::types::UploadResult;

/// Arguments of `oneapp package upload`.
pub struct UploadRequest {
    pub app_id: String,
    pub file: PathBuf,
    pub platform: PlatformType,
    pub name: Option<String>,
    pub channel: ReleaseChannel,
}

/// Uploads a package file and records it in the app's metadata.
pub async fn run_upload(
    service: &DeveloperRepositoryService,
    request: UploadRequest,
) -> Result<UploadResult> {
    let file_name = match request.name {
        Some(name) => name,
        None => local_file_name(&request.file)?,
    };
    let bytes = tokio::fs::read(&request.file)
        .await
        .with_context(|| format!("Failed to read {}", request.file.display()))?;
    debug!(file = %request.file.display(), size = bytes.len(), "Read package");

    let developer_id = developer_id(service).await?;
    let url = service
        .upload_package(
            &developer_id,
            &request.app_id,
            request.platform,
            &file_name,
            &bytes,
            request.channel,
        )
        .await?;

    Ok(UploadResult {
        app_id: request.app_id,
        platform: request.platform,
        channel: request.channel,
        file_name,
        size: bytes.len() as u64,
        url,
    })
}

fn local_file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Cannot derive a file name from {}; pass --name", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_file_name() {
        assert_eq!(
            local_file_name(Path::new("build/out/notes-1.0.apk")).unwrap(),
            "notes-1.0.apk"
        );
        assert!(local_file_name(Path::new("/")).is_err());
    }
}
