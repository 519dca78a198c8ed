// SPDX-License-Identifier: Apache-2.0

//! Authenticated GitHub REST client.
//!
//! Every request carries the access token, the GitHub JSON media type, a
//! User-Agent, and the pinned API version. Non-success responses are mapped
//! to [`ApiError`]; idempotent GETs are retried on transient failures.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{API_VERSION, USER_AGENT as USER_AGENT_VALUE};
use crate::error::{ApiError, OneAppError};
use crate::model::DeveloperProfile;
use crate::retry::{is_retryable, retry_backoff};

/// Fallback wait when a rate-limit response carries no hint.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Builds the shared HTTP client used for GitHub and OAuth requests.
///
/// # Errors
///
/// Returns `OneAppError::Config` if the TLS backend cannot be initialized.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, OneAppError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT_VALUE)
        .timeout(timeout)
        .build()
        .map_err(|e| OneAppError::Config {
            message: format!("failed to build HTTP client: {e}"),
        })
}

/// GitHub REST client bound to one access token.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    token: SecretString,
    backoff: ExponentialBuilder,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

/// Subset of `GET /user` that the profile is built from.
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    name: Option<String>,
    #[serde(default)]
    avatar_url: String,
    bio: Option<String>,
    email: Option<String>,
    blog: Option<String>,
    #[serde(default)]
    html_url: String,
}

impl From<GitHubUser> for DeveloperProfile {
    fn from(user: GitHubUser) -> Self {
        let display_name = user
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| user.login.clone());
        DeveloperProfile {
            id: user.id.to_string(),
            github_username: user.login,
            display_name,
            avatar_url: user.avatar_url,
            bio: user.bio.unwrap_or_default(),
            email: user.email.unwrap_or_default(),
            website: user.blog.unwrap_or_default(),
            github_repo_url: user.html_url,
            is_verified: false,
        }
    }
}

/// Error payload returned by the REST API.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) errors: Vec<Value>,
}

impl ErrorBody {
    fn mentions(&self, needle: &str) -> bool {
        self.message
            .as_deref()
            .is_some_and(|m| m.to_ascii_lowercase().contains(needle))
            || self
                .errors
                .iter()
                .any(|e| e.to_string().to_ascii_lowercase().contains(needle))
    }
}

/// Seconds to wait before retrying a rate-limited request.
fn retry_after_secs(headers: &HeaderMap) -> u64 {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
    };

    if let Some(secs) = header("retry-after") {
        return u64::try_from(secs).unwrap_or(0);
    }
    if let Some(reset) = header("x-ratelimit-reset") {
        let now = chrono::Utc::now().timestamp();
        return u64::try_from(reset.saturating_sub(now)).unwrap_or(0);
    }
    DEFAULT_RETRY_AFTER_SECS
}

/// Maps a non-success response to an [`ApiError`].
pub(crate) fn classify(
    status: StatusCode,
    headers: &HeaderMap,
    body: &ErrorBody,
    resource: &str,
) -> ApiError {
    let message = body
        .message
        .clone()
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
    let rate_limit_exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");

    match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited {
            retry_after: retry_after_secs(headers),
        },
        StatusCode::FORBIDDEN if rate_limit_exhausted || body.mentions("rate limit") => {
            ApiError::RateLimited {
                retry_after: retry_after_secs(headers),
            }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized { message },
        StatusCode::NOT_FOUND => ApiError::NotFound {
            resource: resource.to_string(),
        },
        StatusCode::CONFLICT => ApiError::Conflict {
            resource: resource.to_string(),
            message,
        },
        StatusCode::UNPROCESSABLE_ENTITY
            if body.mentions("sha")
                || body.mentions("already_exists")
                || body.mentions("already exists")
                || body.mentions("fast forward") =>
        {
            ApiError::Conflict {
                resource: resource.to_string(),
                message,
            }
        }
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

impl GitHubClient {
    /// Creates a client for `api_base_url` using `token`.
    #[must_use]
    pub fn new(api_base_url: &str, token: SecretString, http: reqwest::Client) -> Self {
        Self {
            http,
            api_base: api_base_url.trim_end_matches('/').to_string(),
            token,
            backoff: retry_backoff(),
        }
    }

    /// Replaces the retry policy for idempotent reads.
    #[must_use]
    pub fn with_backoff(mut self, backoff: ExponentialBuilder) -> Self {
        self.backoff = backoff;
        self
    }

    /// API base URL without a trailing slash.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub(crate) fn token(&self) -> &SecretString {
        &self.token
    }

    /// Starts a request with the standard GitHub headers.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.api_base))
            .header(AUTHORIZATION, format!("token {}", self.token.expose_secret()))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Sends a request, mapping non-success statuses to [`ApiError`].
    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(ApiError::Transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .ok()
            .and_then(|b| serde_json::from_slice::<ErrorBody>(&b).ok())
            .unwrap_or_default();
        let err = classify(status, &headers, &body, resource);
        debug!(status = status.as_u16(), resource, error = %err, "GitHub request failed");
        Err(err)
    }

    /// Sends a request and decodes the JSON response.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> Result<T, ApiError> {
        let response = self.send(request, resource).await?;
        let bytes = response.bytes().await.map_err(ApiError::Transport)?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Malformed {
            message: format!("{resource}: {e}"),
        })
    }

    /// GETs and decodes `path`, retrying transient failures.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        (|| async {
            self.send_json(self.request(Method::GET, path).query(query), path)
                .await
        })
        .retry(self.backoff)
        .when(is_retryable)
        .notify(|err, dur| {
            warn!(
                error = %err,
                retry_after = ?dur,
                path,
                "Retrying GitHub GET"
            );
        })
        .await
    }

    /// Fetches the authenticated user and maps it to a developer profile.
    ///
    /// A missing display name falls back to the login; missing bio, email
    /// and blog become empty strings.
    #[instrument(skip(self))]
    pub async fn get_authenticated_user(&self) -> Result<DeveloperProfile, ApiError> {
        let user: GitHubUser = self.get_json("/user", &[]).await?;
        debug!(login = %user.login, "Fetched authenticated user");
        Ok(user.into())
    }

    /// Creates a repository owned by the authenticated user.
    ///
    /// The repository is initialized with a README so that the default branch
    /// exists. Fails with [`ApiError::Conflict`] if the name is taken.
    #[instrument(skip(self, description))]
    pub async fn create_repository(
        &self,
        name: &str,
        description: &str,
        private: bool,
    ) -> Result<RepositoryRef, ApiError> {
        let body = serde_json::json!({
            "name": name,
            "description": description,
            "private": private,
            "auto_init": true,
        });
        let repo: RepositoryRef = self
            .send_json(
                self.request(Method::POST, "/user/repos").json(&body),
                "/user/repos",
            )
            .await?;
        debug!(full_name = %repo.full_name, "Created repository");
        Ok(repo)
    }
}

/// A GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// `owner/name`.
    pub full_name: String,
    /// Web URL.
    pub html_url: String,
    /// Default branch.
    #[serde(default)]
    pub default_branch: String,
    /// Whether the repository is private.
    #[serde(default)]
    pub private: bool,
}
