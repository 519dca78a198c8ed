// SPDX-License-Identifier: Apache-2.0

//! GitHub integration module.
//!
//! Provides the OAuth flow, the REST client for repository content and
//! releases, and the keyring token store.

use tracing::debug;

use crate::error::OneAppError;

#[cfg(feature = "keyring")]
pub mod auth;
pub mod client;
pub mod contents;
pub mod git;
pub mod loopback;
pub mod oauth;
pub mod ratelimit;
pub mod releases;

/// Keyring service name for storing credentials.
#[cfg(feature = "keyring")]
pub const KEYRING_SERVICE: &str = "oneapp";

/// User-Agent sent with every GitHub request.
pub const USER_AGENT: &str = concat!("oneapp/", env!("CARGO_PKG_VERSION"));

/// REST API version pinned via `X-GitHub-Api-Version`.
pub const API_VERSION: &str = "2022-11-28";

/// Parses an owner/repo string to extract owner and repo.
///
/// Validates format: exactly one `/`, non-empty parts.
///
/// # Errors
///
/// Returns `OneAppError::InvalidInput` if the format is invalid.
pub fn parse_owner_repo(s: &str) -> Result<(String, String), OneAppError> {
    let parts: Vec<&str> = s.trim().split('/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(OneAppError::invalid_input(format!(
            "invalid repository '{s}', expected owner/repo"
        )));
    }
    debug!(owner = parts[0], repo = parts[1], "Parsed repository");
    Ok((parts[0].to_string(), parts[1].to_string()))
}

/// Parses a GitHub repository URL into owner and repo.
///
/// Accepts `https://<host>/owner/repo`, with or without `.git`,
/// `git@<host>:owner/repo.git`, and plain `owner/repo`.
///
/// # Errors
///
/// Returns `OneAppError::InvalidInput` if no owner/repo pair can be found.
pub fn parse_repo_url(url: &str) -> Result<(String, String), OneAppError> {
    let url = url.trim();
    let path = if let Some(rest) = url.strip_prefix("git@") {
        rest.split_once(':').map(|(_, path)| path.to_string())
    } else if url.contains("://") {
        reqwest::Url::parse(url).ok().map(|u| u.path().to_string())
    } else {
        Some(url.to_string())
    };
    let path = path.unwrap_or_default();
    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    parse_owner_repo(path).map_err(|_| {
        OneAppError::invalid_input(format!("invalid repository URL '{url}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_owner_repo_valid() {
        let (owner, repo) = parse_owner_repo("octocat/apps").unwrap();
        assert_eq!(owner, "octocat");
        assert_eq!(repo, "apps");
    }

    #[test]
    fn test_parse_owner_repo_invalid_no_slash() {
        assert!(parse_owner_repo("octocat").is_err());
    }

    #[test]
    fn test_parse_owner_repo_invalid_empty_owner() {
        assert!(parse_owner_repo("/repo").is_err());
    }

    #[test]
    fn test_parse_owner_repo_invalid_extra_segment() {
        assert!(parse_owner_repo("a/b/c").is_err());
    }

    #[test]
    fn test_parse_repo_url_forms() {
        let expected = ("dev1".to_string(), "oneapp-store".to_string());
        assert_eq!(
            parse_repo_url("https://github.com/dev1/oneapp-store.git").unwrap(),
            expected
        );
        assert_eq!(
            parse_repo_url("https://github.com/dev1/oneapp-store").unwrap(),
            expected
        );
        assert_eq!(
            parse_repo_url("git@github.com:dev1/oneapp-store.git").unwrap(),
            expected
        );
        assert_eq!(parse_repo_url("dev1/oneapp-store").unwrap(), expected);
    }

    #[test]
    fn test_parse_repo_url_invalid() {
        assert!(parse_repo_url("https://github.com/dev1").is_err());
        assert!(parse_repo_url("git@github.com").is_err());
    }
}
