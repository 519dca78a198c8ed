// SPDX-License-Identifier: Apache-2.0

//! Retry logic with exponential backoff for transient failures.
//!
//! Only idempotent reads are retried. Writes and the OAuth code exchange are
//! sent once; a conflicting write is handled by the service layer instead.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::error::ApiError;

/// Determines if an HTTP status code is retryable.
///
/// Retryable status codes are:
/// - 500 (Internal Server Error)
/// - 502 (Bad Gateway)
/// - 503 (Service Unavailable)
/// - 504 (Gateway Timeout)
///
/// 429 is not in the list: rate limits surface as
/// [`ApiError::RateLimited`] with the server's hint.
#[must_use]
pub fn is_retryable_http(status: u16) -> bool {
    matches!(status, 500 | 502 | 503 | 504)
}

/// Determines if an API error is transient.
///
/// Retryable errors are connection failures, timeouts, and the 5xx statuses
/// accepted by [`is_retryable_http`].
#[must_use]
pub fn is_retryable(e: &ApiError) -> bool {
    match e {
        ApiError::Transport(err) => err.is_connect() || err.is_timeout(),
        ApiError::Unreachable { .. } => true,
        ApiError::Status { status, .. } => is_retryable_http(*status),
        _ => false,
    }
}

/// Creates a configured exponential backoff builder for retries.
///
/// - Factor: 2 (exponential growth)
/// - Min delay: 1 second
/// - Max times: 3 retries
/// - Jitter: enabled
#[must_use]
pub fn retry_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_factor(2.0)
        .with_min_delay(Duration::from_secs(1))
        .with_max_times(3)
        .with_jitter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_gateway_style_statuses_are_retryable() {
        for status in [500, 502, 503, 504] {
            assert!(is_retryable_http(status), "{status} should retry");
        }
        for status in [200, 400, 401, 403, 404, 409, 422, 429, 501] {
            assert!(!is_retryable_http(status), "{status} should not retry");
        }
    }

    #[test]
    fn test_status_errors() {
        let unavailable = ApiError::Status {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(is_retryable(&unavailable));

        let invalid = ApiError::Status {
            status: 422,
            message: "invalid".to_string(),
        };
        assert!(!is_retryable(&invalid));
    }

    #[test]
    fn test_domain_errors_are_not_retryable() {
        assert!(!is_retryable(&ApiError::RateLimited { retry_after: 10 }));
        assert!(!is_retryable(&ApiError::Conflict {
            resource: "42/stable/apps/notes/metadata.json".to_string(),
            message: "sha does not match".to_string()
        }));
        assert!(!is_retryable(&ApiError::NotFound {
            resource: "42/stable/apps".to_string()
        }));
    }

    #[tokio::test]
    async fn test_refused_connection_is_retryable() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = reqwest::Client::new()
            .get(format!("http://127.0.0.1:{port}/user"))
            .send()
            .await
            .unwrap_err();
        assert!(is_retryable(&ApiError::Transport(err)));
        assert!(is_retryable(&ApiError::Unreachable {
            message: "connection refused".to_string()
        }));
    }
}
