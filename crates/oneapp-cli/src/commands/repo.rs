// SPDX-License-Identifier: Apache-2.0

//! Storage repository commands.

use anyhow::Result;
use oneapp_core::DeveloperRepositoryService;

use super::developer_id;
use super::types::{LinkResult, RepoResult, SetupResult};

/// Creates the storage repository, or returns it if it already exists.
pub async fn run_create(service: &DeveloperRepositoryService, private: bool) -> Result<RepoResult> {
    let repository = service.create_developer_repository(private).await?;
    Ok(RepoResult { repository })
}

/// Creates the README and per-channel app directories.
pub async fn run_setup(service: &DeveloperRepositoryService) -> Result<SetupResult> {
    let developer_id = developer_id(service).await?;
    let commits = service
        .setup_developer_directory_structure(&developer_id)
        .await?;
    Ok(SetupResult {
        developer_id,
        created: commits.into_iter().map(|c| c.path).collect(),
    })
}

/// Links `url`, or the storage repository, into the store index.
pub async fn run_link(
    service: &DeveloperRepositoryService,
    url: Option<String>,
) -> Result<LinkResult> {
    let developer_id = developer_id(service).await?;
    let url = match url {
        Some(url) => url,
        None => {
            let (owner, name) = service.storage_repository().await?;
            format!("{owner}/{name}")
        }
    };
    let link = service
        .add_repository_as_submodule(&developer_id, &url)
        .await?;
    Ok(LinkResult {
        action: "linked",
        link,
    })
}

/// Moves the developer's submodule to the storage repository's latest commit.
pub async fn run_sync(service: &DeveloperRepositoryService) -> Result<LinkResult> {
    let developer_id = developer_id(service).await?;
    let link = service.update_submodule_reference(&developer_id).await?;
    Ok(LinkResult {
        action: "updated",
        link,
    })
}
