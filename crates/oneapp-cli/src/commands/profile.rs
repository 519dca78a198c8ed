// SPDX-License-Identifier: Apache-2.0

//! Developer profile command.

use anyhow::Result;
use oneapp_core::DeveloperRepositoryService;

use super::types::ProfileResult;

/// Shows the cached profile, fetching it when missing or when `refresh` is set.
pub async fn run_show(service: &DeveloperRepositoryService, refresh: bool) -> Result<ProfileResult> {
    if !refresh && let Some(profile) = service.profile()? {
        return Ok(ProfileResult {
            profile,
            refreshed: false,
        });
    }
    let profile = service.refresh_profile().await?;
    Ok(ProfileResult {
        profile,
        refreshed: true,
    })
}
