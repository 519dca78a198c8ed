// SPDX-License-Identifier: Apache-2.0

//! GitHub API rate limit checking.
//!
//! Provides utilities to check and report on GitHub API rate limit status.

use octocrab::Octocrab;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, instrument};

use super::client::GitHubClient;
use crate::error::ApiError;

/// GitHub API rate limit status.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    /// Number of API calls remaining in the current rate limit window.
    pub remaining: u32,
    /// Total number of API calls allowed in the rate limit window.
    pub limit: u32,
    /// Unix timestamp when the rate limit resets.
    pub reset_at: u64,
}

impl RateLimitStatus {
    /// Returns true if rate limit is low (remaining < 100).
    #[must_use]
    pub fn is_low(&self) -> bool {
        self.remaining < 100
    }

    /// Returns a human-readable status message.
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "GitHub API: {}/{} calls remaining",
            self.remaining, self.limit
        )
    }
}

/// Creates an Octocrab client for `api_base_url` authenticated with `token`.
fn octocrab_client(api_base_url: &str, token: &SecretString) -> Result<Octocrab, ApiError> {
    let malformed = |e: octocrab::Error| ApiError::Malformed {
        message: format!("failed to build GitHub client: {e}"),
    };
    Octocrab::builder()
        .base_uri(api_base_url)
        .map_err(malformed)?
        .personal_token(token.expose_secret().to_string())
        .build()
        .map_err(malformed)
}

fn map_octocrab_error(e: octocrab::Error) -> ApiError {
    match e {
        octocrab::Error::GitHub { source, .. } => match source.status_code.as_u16() {
            401 | 403 => ApiError::Unauthorized {
                message: source.message,
            },
            status => ApiError::Status {
                status,
                message: source.message,
            },
        },
        err @ (octocrab::Error::Serde { .. } | octocrab::Error::Json { .. }) => {
            ApiError::Malformed {
                message: err.to_string(),
            }
        }
        other => ApiError::Unreachable {
            message: other.to_string(),
        },
    }
}

impl GitHubClient {
    /// Checks the GitHub API rate limit status.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn check_rate_limit(&self) -> Result<RateLimitStatus, ApiError> {
        debug!("Checking GitHub API rate limit");

        let client = octocrab_client(self.api_base(), self.token())?;
        let rate_limit = client
            .ratelimit()
            .get()
            .await
            .map_err(map_octocrab_error)?;

        #[allow(clippy::cast_possible_truncation)]
        let status = RateLimitStatus {
            remaining: rate_limit.resources.core.remaining as u32,
            limit: rate_limit.resources.core.limit as u32,
            reset_at: rate_limit.resources.core.reset,
        };

        debug!(
            remaining = status.remaining,
            limit = status.limit,
            "GitHub rate limit status"
        );

        Ok(status)
    }
}
