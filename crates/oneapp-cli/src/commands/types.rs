// SPDX-License-Identifier: Apache-2.0

//! Result types returned by command handlers.
//!
//! These types allow command handlers to return data instead of printing
//! directly, improving testability and separation of concerns.

use oneapp_core::{
    AppMetadata, DeveloperProfile, PlatformType, RateLimitStatus, ReleaseChannel, ReleaseRef,
    RepositoryRef, SubmoduleLink,
};
use serde::Serialize;

/// Result from the auth login command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LoginResult {
    /// Profile of the signed-in developer.
    pub profile: DeveloperProfile,
    /// Whether an existing session was kept instead of signing in.
    pub already_authenticated: bool,
}

/// Result from the auth logout command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LogoutResult {
    /// Whether a session existed before logging out.
    pub was_authenticated: bool,
}

/// Result from the auth status command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthStatusResult {
    /// Whether a token is stored.
    pub authenticated: bool,
    /// Token store backend in use.
    pub backend: String,
    /// GitHub username from the cached profile.
    pub username: Option<String>,
    /// API rate limit, when it could be fetched.
    pub rate_limit: Option<RateLimitStatus>,
}

/// Result from the profile show command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ProfileResult {
    /// The developer profile.
    pub profile: DeveloperProfile,
    /// Whether it was fetched from GitHub during this command.
    pub refreshed: bool,
}

/// Result from the app list command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AppListResult {
    /// Channel that was listed.
    pub channel: ReleaseChannel,
    /// Apps in directory order.
    pub apps: Vec<AppMetadata>,
}

/// Result from the app show command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AppResult {
    /// Channel the app was read from.
    pub channel: ReleaseChannel,
    /// App metadata.
    pub app: AppMetadata,
}

/// Result from app create, update and delete.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AppWriteResult {
    /// What happened (`created`, `updated`, `deleted`).
    pub action: &'static str,
    /// App id.
    pub app_id: String,
    /// Channel that was written.
    pub channel: ReleaseChannel,
    /// Commit that made the change, when known.
    pub commit_sha: Option<String>,
}

/// Result from the package upload command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct UploadResult {
    /// App id.
    pub app_id: String,
    /// Platform the package is for.
    pub platform: PlatformType,
    /// Channel that was written.
    pub channel: ReleaseChannel,
    /// File name in the repository.
    pub file_name: String,
    /// Size in bytes.
    pub size: u64,
    /// Download URL recorded in the metadata.
    pub url: String,
}

/// Result from the release publish command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ReleaseResult {
    /// App id.
    pub app_id: String,
    /// Released version.
    pub version: String,
    /// Channel of the release.
    pub channel: ReleaseChannel,
    /// The GitHub release.
    pub release: ReleaseRef,
}

/// Result from the repo create command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RepoResult {
    /// The storage repository.
    pub repository: RepositoryRef,
}

/// Result from the repo link and repo sync commands.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LinkResult {
    /// What the command did when something changed.
    pub action: &'static str,
    /// The submodule as it now stands.
    #[serde(flatten)]
    pub link: SubmoduleLink,
}

/// Result from the repo setup command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SetupResult {
    /// Developer directory that was set up.
    pub developer_id: String,
    /// Files created by this run; empty if everything existed.
    pub created: Vec<String>,
}
