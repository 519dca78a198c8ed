// SPDX-License-Identifier: Apache-2.0

//! Error types for OneApp.
//!
//! Uses `thiserror` for deriving `std::error::Error` implementations.
//! Every client operation returns one of these typed failures; the CLI wraps
//! them in `anyhow::Result` at the top level.

use thiserror::Error;

/// Errors from the OAuth authorization-code flow.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The token endpoint rejected the code, was unreachable, or returned no token.
    #[error("Failed to exchange authorization code: {message}")]
    ExchangeFailed {
        /// Reason reported by the provider or the transport.
        message: String,
    },

    /// The user declined, the host cancelled, or the redirect wait timed out.
    #[error("Authorization was cancelled")]
    Cancelled,

    /// The redirect carried a `state` that does not belong to this flow.
    #[error("Authorization redirect did not match this login attempt (state mismatch)")]
    StateMismatch,

    /// The provider reported an error we have no dedicated variant for.
    #[error("Authorization failed: {message}")]
    Unknown {
        /// Error code and description from the redirect.
        message: String,
    },

    /// OAuth client credentials are missing from the configuration.
    #[error("OAuth client is not configured: {message}")]
    NotConfigured {
        /// Which setting is missing.
        message: String,
    },

    /// The token was obtained but the developer profile could not be fetched.
    #[error("Authenticated, but failed to fetch the developer profile: {0}")]
    Profile(#[source] ApiError),

    /// The token could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the GitHub REST API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// 401/403, or no stored token. The caller should re-authenticate.
    #[error("GitHub rejected the credentials: {message}")]
    Unauthorized {
        /// Message from GitHub.
        message: String,
    },

    /// The requested resource does not exist.
    #[error("Not found: {resource}")]
    NotFound {
        /// Path or endpoint that was requested.
        resource: String,
    },

    /// Primary or secondary rate limit hit.
    #[error("GitHub rate limit exceeded, retry after {retry_after}s")]
    RateLimited {
        /// Seconds to wait before retrying, as hinted by GitHub.
        retry_after: u64,
    },

    /// A write raced another writer (stale blob SHA) or the target already exists.
    #[error("Conflicting update to {resource}: {message}")]
    Conflict {
        /// Path or endpoint that was written.
        resource: String,
        /// Message from GitHub.
        message: String,
    },

    /// Network-level failure before a response was received.
    #[error("Network error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Network-level failure reported by a client other than `reqwest`.
    #[error("Network error: {message}")]
    Unreachable {
        /// Error reported by the client.
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("Unexpected response from GitHub: {message}")]
    Malformed {
        /// What could not be decoded.
        message: String,
    },

    /// Any other non-success status.
    #[error("GitHub API error (HTTP {status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message from GitHub.
        message: String,
    },
}

impl ApiError {
    /// Returns true if the caller should run the login flow again.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// Returns true if the error is a stale-SHA or already-exists conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict { .. })
    }

    pub(crate) fn not_authenticated() -> Self {
        ApiError::Unauthorized {
            message: "no access token stored".to_string(),
        }
    }
}

/// Errors from the local token store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Session file could not be read or written.
    #[error("Session storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be (de)serialized.
    #[error("Corrupt session data: {0}")]
    Serde(#[from] serde_json::Error),

    /// Keyring/credential storage error.
    #[cfg(feature = "keyring")]
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Errors that can occur during OneApp operations.
#[derive(Error, Debug)]
pub enum OneAppError {
    /// OAuth flow failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// GitHub API failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Token store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration file error.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// Caller supplied an identifier or value that cannot be used.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message.
        message: String,
    },
}

impl OneAppError {
    /// Returns true if the operation failed because GitHub no longer accepts
    /// the stored token (or none is stored), so `authenticate()` should run again.
    #[must_use]
    pub fn requires_reauthentication(&self) -> bool {
        match self {
            OneAppError::Api(err) | OneAppError::Auth(AuthError::Profile(err)) => {
                err.is_unauthorized()
            }
            _ => false,
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        OneAppError::InvalidInput {
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for OneAppError {
    fn from(err: config::ConfigError) -> Self {
        OneAppError::Config {
            message: err.to_string(),
        }
    }
}
