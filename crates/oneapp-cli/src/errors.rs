// SPDX-License-Identifier: Apache-2.0

//! CLI-specific error formatting with user-friendly hints.
//!
//! Downcasts `anyhow::Error` to `OneAppError` (or one of its component error
//! types) and appends a hint about what to do next. The library reports
//! structured errors; wording for a terminal user lives here.

use std::fmt::Write;

use anyhow::Error;
use oneapp_core::{ApiError, AuthError, OneAppError, StoreError};

const LOGIN_HINT: &str = "Tip: Run `oneapp auth login` to sign in again.";

/// Formats an error for CLI display with helpful hints.
///
/// Errors that are not OneApp errors are shown with their context chain.
pub fn format_error(error: &Error) -> String {
    if let Some(err) = error.downcast_ref::<OneAppError>() {
        return format_oneapp_error(error, err);
    }
    if let Some(err) = error.downcast_ref::<AuthError>() {
        return with_hint(error, auth_hint(err));
    }
    if let Some(err) = error.downcast_ref::<ApiError>() {
        return with_hint(error, api_hint(err));
    }
    format!("{error:#}")
}

fn format_oneapp_error(error: &Error, err: &OneAppError) -> String {
    let hint = match err {
        OneAppError::Auth(auth) => auth_hint(auth),
        OneAppError::Api(api) => api_hint(api),
        OneAppError::Store(store) => store_hint(store),
        OneAppError::Config { .. } => Some(format!(
            "Tip: Check your config file at {}",
            oneapp_core::config_file_path().display()
        )),
        OneAppError::InvalidInput { .. } => None,
    };
    with_hint(error, hint)
}

fn with_hint(error: &Error, hint: Option<String>) -> String {
    let mut msg = format!("{error:#}");
    if let Some(hint) = hint {
        let _ = write!(msg, "\n\n{hint}");
    }
    msg
}

fn auth_hint(err: &AuthError) -> Option<String> {
    match err {
        AuthError::NotConfigured { .. } => Some(
            "Tip: Set `client_id` and `client_secret` under [oauth] in your config file,\n\
             or export ONEAPP_OAUTH__CLIENT_ID and ONEAPP_OAUTH__CLIENT_SECRET."
                .to_string(),
        ),
        AuthError::Cancelled => {
            Some("Tip: Run `oneapp auth login` again when you are ready.".to_string())
        }
        AuthError::StateMismatch => Some(
            "Tip: The redirect came from a different login attempt. Start a new one with `oneapp auth login`."
                .to_string(),
        ),
        AuthError::ExchangeFailed { .. } => Some(
            "Tip: Authorization codes can only be used once. Run `oneapp auth login` again."
                .to_string(),
        ),
        AuthError::Profile(api) => api_hint(api),
        AuthError::Store(store) => store_hint(store),
        AuthError::Unknown { .. } => None,
    }
}

fn api_hint(err: &ApiError) -> Option<String> {
    match err {
        ApiError::Unauthorized { .. } => Some(LOGIN_HINT.to_string()),
        ApiError::RateLimited { retry_after } => Some(format!(
            "Tip: You've hit the GitHub API rate limit.\n- Wait at least {retry_after} seconds before retrying."
        )),
        ApiError::Conflict { .. } => Some(
            "Tip: Someone else changed this file at the same time. Run the command again."
                .to_string(),
        ),
        ApiError::NotFound { .. } => Some(
            "Tip: Check the app id and channel, or run `oneapp repo setup` for a new repository."
                .to_string(),
        ),
        ApiError::Transport(_) | ApiError::Unreachable { .. } => {
            Some("Tip: Check your internet connection and try again.".to_string())
        }
        ApiError::Malformed { .. } | ApiError::Status { .. } => None,
    }
}

fn store_hint(err: &StoreError) -> Option<String> {
    match err {
        StoreError::Keyring(_) => Some(
            "Tip: Your system keyring may be locked. Unlock it, or set ONEAPP_STORE__BACKEND=file."
                .to_string(),
        ),
        StoreError::Io(_) | StoreError::Serde(_) => None,
    }
}
