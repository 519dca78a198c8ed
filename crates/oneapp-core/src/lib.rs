// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! # OneApp Core
//!
//! Core library for OneApp - publishing apps to a GitHub-backed app store.
//!
//! This crate provides reusable components for:
//! - GitHub OAuth sign-in (authorization code flow with state and PKCE)
//! - Reading and writing store files through the GitHub contents API
//! - Releases tagged per channel
//! - Linking developer repositories into the store index as submodules
//! - Local token storage (keyring, file, memory)
//! - Configuration management
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oneapp_core::{
//!     DeveloperRepositoryService, LoopbackListener, ReleaseChannel, load_config, open_store,
//! };
//! use anyhow::Result;
//!
//! # async fn example() -> Result<()> {
//! let config = load_config()?;
//! let store = open_store(&config.store)?;
//! let service = DeveloperRepositoryService::new(&config, store)?;
//!
//! // Sign in through the browser; the loopback listener receives the redirect
//! let listener = LoopbackListener::from_redirect_uri(service.oauth().redirect_uri())?
//!     .on_ready(|url| println!("Open {url}"));
//! let profile = service.authenticate(&listener).await?;
//!
//! for app in service.list_apps(&profile.id, ReleaseChannel::Stable).await? {
//!     println!("{} {}", app.name, app.version);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`auth`] - Token store trait and backends
//! - [`config`] - Configuration loading and paths
//! - [`error`] - Error types
//! - [`github`] - GitHub API (OAuth, contents, git data, releases, rate limit)
//! - [`gitmodules`] - The store index's submodule registry
//! - [`layout`] - Paths and tags inside the storage repository
//! - [`model`] - Profiles, app metadata, platforms, channels
//! - [`service`] - Developer operations composed from the above

// ============================================================================
// Authentication
// ============================================================================

pub use auth::{MemoryTokenStore, TokenStore, open_store};
pub use session::FileTokenStore;

#[cfg(feature = "keyring")]
pub use github::auth::KeyringTokenStore;

// ============================================================================
// Error Handling
// ============================================================================

pub use error::{ApiError, AuthError, OneAppError, StoreError};

/// Convenience Result type for OneApp operations.
///
/// This is equivalent to `std::result::Result<T, OneAppError>`.
pub type Result<T> = std::result::Result<T, OneAppError>;

// ============================================================================
// Configuration
// ============================================================================

pub use config::{
    AppConfig, GitHubConfig, OAuthConfig, StoreBackend, StoreConfig, config_dir,
    config_file_path, data_dir, load_config,
};

// ============================================================================
// Domain Model
// ============================================================================

pub use model::{AppMetadata, AppPlatform, DeveloperProfile, PlatformType, ReleaseChannel};

// ============================================================================
// GitHub Integration
// ============================================================================

pub use github::client::{GitHubClient, RepositoryRef};
pub use github::contents::{CommitRef, ContentEntry, ContentKind, RemoteFile, Repository};
pub use github::git::TreeEntry;
pub use gitmodules::{GitModules, SubmoduleLink};
pub use github::loopback::LoopbackListener;
pub use github::oauth::{
    AuthFlow, AuthState, OAuthClient, PendingAuthorization, RedirectHandle, UserAgent,
    build_authorization_url,
};
pub use github::ratelimit::RateLimitStatus;
pub use github::releases::ReleaseRef;

/// URL type used by the OAuth flow and its redirect handlers.
pub use reqwest::Url;

// ============================================================================
// Retry Logic
// ============================================================================

pub use retry::{is_retryable, is_retryable_http, retry_backoff};

// ============================================================================
// Developer Operations
// ============================================================================

pub use service::DeveloperRepositoryService;

// ============================================================================
// Modules
// ============================================================================

pub mod auth;
pub mod config;
pub mod error;
pub mod github;
pub mod gitmodules;
pub mod layout;
pub mod model;
pub mod retry;
pub mod service;
pub mod session;

#[cfg(test)]
mod testing;
