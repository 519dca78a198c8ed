// SPDX-License-Identifier: Apache-2.0

//! Release-related GitHub operations.
//!
//! Releases are tagged on the channel's branch; beta releases are published
//! as GitHub pre-releases.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::contents::Repository;
use crate::error::ApiError;
use crate::model::ReleaseChannel;

/// A published GitHub release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRef {
    /// Release id.
    pub id: u64,
    /// Git tag.
    pub tag_name: String,
    /// Web URL of the release page.
    pub html_url: String,
    /// Whether the release is marked as a pre-release.
    #[serde(default)]
    pub prerelease: bool,
}

#[derive(Serialize)]
struct CreateRelease<'a> {
    tag_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_commitish: Option<&'a str>,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
}

impl Repository<'_> {
    /// Creates a release for `tag`.
    ///
    /// The tag is created on the pinned branch if it does not exist.
    /// A tag that already has a release fails with [`ApiError::Conflict`].
    #[instrument(skip(self, body), fields(repo = %format!("{}/{}", self.owner(), self.name())))]
    pub async fn create_release(
        &self,
        tag: &str,
        name: &str,
        body: &str,
        channel: ReleaseChannel,
    ) -> Result<ReleaseRef, ApiError> {
        let request = CreateRelease {
            tag_name: tag,
            target_commitish: self.branch(),
            name,
            body,
            draft: false,
            prerelease: channel.is_prerelease(),
        };
        let path = self.api_path("/releases");
        let client = self.client();
        let release: ReleaseRef = client
            .send_json(client.request(Method::POST, &path).json(&request), &path)
            .await?;
        debug!(id = release.id, tag = %release.tag_name, "Created release");
        Ok(release)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;
    use crate::github::client::tests::test_client;
    use crate::testing::spawn_server;

    async fn release_server() -> (String, Arc<Mutex<Vec<Value>>>) {
        async fn create(
            State(seen): State<Arc<Mutex<Vec<Value>>>>,
            Json(body): Json<Value>,
        ) -> (StatusCode, Json<Value>) {
            let mut seen = seen.lock().unwrap();
            if seen.iter().any(|b| b["tag_name"] == body["tag_name"]) {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({
                        "message": "Validation Failed",
                        "errors": [{"resource": "Release", "code": "already_exists", "field": "tag_name"}]
                    })),
                );
            }
            seen.push(body.clone());
            (
                StatusCode::CREATED,
                Json(json!({
                    "id": seen.len(),
                    "tag_name": body["tag_name"],
                    "html_url": format!("https://github.com/o/r/releases/tag/{}", body["tag_name"].as_str().unwrap()),
                    "prerelease": body["prerelease"],
                })),
            )
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/repos/{owner}/{name}/releases", post(create))
            .with_state(seen.clone());
        (spawn_server(app).await, seen)
    }

    #[tokio::test]
    async fn test_beta_release_is_prerelease_on_branch() {
        let (base, seen) = release_server().await;
        let client = test_client(&base);

        let release = client
            .repo("o", "r")
            .on_branch("beta")
            .create_release("notes-v1.0.0-beta", "Notes 1.0.0", "First beta", ReleaseChannel::Beta)
            .await
            .unwrap();

        assert!(release.prerelease);
        assert_eq!(release.tag_name, "notes-v1.0.0-beta");
        let body = &seen.lock().unwrap()[0];
        assert_eq!(body["target_commitish"], "beta");
        assert_eq!(body["prerelease"], true);
        assert_eq!(body["draft"], false);
    }

    #[tokio::test]
    async fn test_stable_release_and_duplicate_tag() {
        let (base, _seen) = release_server().await;
        let client = test_client(&base);
        let repo = client.repo("o", "r");

        let release = repo
            .create_release("notes-v1.0.0", "Notes 1.0.0", "", ReleaseChannel::Stable)
            .await
            .unwrap();
        assert!(!release.prerelease);

        let err = repo
            .create_release("notes-v1.0.0", "Notes 1.0.0", "", ReleaseChannel::Stable)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }
}
