// SPDX-License-Identifier: Apache-2.0

//! Configuration management for OneApp.
//!
//! Provides layered configuration from files and environment variables.
//! Uses XDG-compliant paths with environment variable support.
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables (prefix: `ONEAPP_`)
//! 2. Config file: `~/.config/oneapp/config.toml`
//! 3. Built-in defaults
//!
//! OAuth client credentials are never built in; they must come from the
//! config file or the environment.
//!
//! # Examples
//!
//! ```bash
//! ONEAPP_OAUTH__CLIENT_ID=Iv1.abc ONEAPP_OAUTH__CLIENT_SECRET=... oneapp auth login
//! ```

use std::path::PathBuf;

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::OneAppError;
use crate::model::ReleaseChannel;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// OAuth application settings.
    pub oauth: OAuthConfig,
    /// GitHub API settings.
    pub github: GitHubConfig,
    /// Where the access token and profile are kept.
    pub store: StoreConfig,
}

/// OAuth application settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// OAuth App client ID.
    pub client_id: String,
    /// OAuth App client secret.
    #[serde(deserialize_with = "deserialize_secret")]
    pub client_secret: SecretString,
    /// Redirect URI registered with the OAuth App.
    pub redirect_uri: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
    /// How long to wait for the browser redirect, in seconds.
    pub timeout_seconds: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: SecretString::from(String::new()),
            redirect_uri: "http://127.0.0.1:8765/oauth/callback".to_string(),
            scopes: vec![
                "repo".to_string(),
                "user:email".to_string(),
                "workflow".to_string(),
            ],
            timeout_seconds: 300,
        }
    }
}

/// GitHub API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// REST API base URL.
    pub api_base_url: String,
    /// Base URL of the OAuth authorize/token endpoints.
    pub oauth_base_url: String,
    /// Storage repository as `owner/repo`. Defaults to the
    /// authenticated user's `default_repo_name` repository.
    pub repository: Option<String>,
    /// Repository name used when `repository` is not set.
    pub default_repo_name: String,
    /// Store index repository as `owner/repo`, which links developer
    /// repositories as submodules.
    pub store_repository: Option<String>,
    /// Branch that stable-channel writes go to.
    pub stable_branch: String,
    /// Branch that beta-channel writes go to.
    pub beta_branch: String,
    /// API request timeout in seconds.
    pub api_timeout_seconds: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            oauth_base_url: "https://github.com".to_string(),
            repository: None,
            default_repo_name: "oneapp-store".to_string(),
            store_repository: None,
            stable_branch: "main".to_string(),
            beta_branch: "main".to_string(),
            api_timeout_seconds: 30,
        }
    }
}

impl GitHubConfig {
    /// Branch that writes for `channel` target.
    #[must_use]
    pub fn branch_for(&self, channel: ReleaseChannel) -> &str {
        match channel {
            ReleaseChannel::Stable => &self.stable_branch,
            ReleaseChannel::Beta => &self.beta_branch,
        }
    }
}

/// Token store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// System keyring (requires the `keyring` feature).
    #[default]
    Keyring,
    /// JSON file in the data directory.
    File,
    /// Process memory only; nothing survives exit.
    Memory,
}

/// Token store settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to use.
    pub backend: StoreBackend,
    /// Session file for the `file` backend. Defaults to `<data_dir>/session.json`.
    pub path: Option<PathBuf>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// Returns the OneApp configuration directory.
///
/// Respects the `XDG_CONFIG_HOME` environment variable if set,
/// otherwise defaults to `~/.config/oneapp`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        return PathBuf::from(xdg_config).join("oneapp");
    }
    dirs::home_dir()
        .expect("Could not determine home directory - is HOME set?")
        .join(".config")
        .join("oneapp")
}

/// Returns the OneApp data directory.
///
/// Respects the `XDG_DATA_HOME` environment variable if set,
/// otherwise defaults to `~/.local/share/oneapp`.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME")
        && !xdg_data.is_empty()
    {
        return PathBuf::from(xdg_data).join("oneapp");
    }
    dirs::home_dir()
        .expect("Could not determine home directory - is HOME set?")
        .join(".local")
        .join("share")
        .join("oneapp")
}

/// Returns the path to the configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Load application configuration.
///
/// Loads from config file (if exists) and environment variables.
/// Environment variables use the prefix `ONEAPP_` and double underscore
/// for nested keys (e.g., `ONEAPP_GITHUB__REPOSITORY`). `ONEAPP_OAUTH__SCOPES`
/// takes a space-separated list.
///
/// # Errors
///
/// Returns `OneAppError::Config` if the config file exists but is invalid.
pub fn load_config() -> Result<AppConfig, OneAppError> {
    let config_path = config_file_path();

    let config = Config::builder()
        // Load from config file (optional - may not exist)
        .add_source(File::with_name(config_path.to_string_lossy().as_ref()).required(false))
        // Override with environment variables
        .add_source(
            Environment::with_prefix("ONEAPP")
                .separator("__")
                .list_separator(" ")
                .with_list_parse_key("oauth.scopes")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;

    fn parse(config_str: &str) -> AppConfig {
        Config::builder()
            .add_source(config::File::from_str(config_str, config::FileFormat::Toml))
            .build()
            .expect("should build config")
            .try_deserialize()
            .expect("should deserialize")
    }

    #[test]
    #[serial]
    fn test_load_config_defaults() {
        // Without any config file or env vars, should return defaults
        let config = load_config().expect("should load with defaults");

        assert_eq!(config.github.api_base_url, "https://api.github.com");
        assert_eq!(config.github.oauth_base_url, "https://github.com");
        assert_eq!(config.github.default_repo_name, "oneapp-store");
        assert_eq!(config.github.api_timeout_seconds, 30);
        assert_eq!(config.oauth.timeout_seconds, 300);
        assert_eq!(config.oauth.scopes, vec!["repo", "user:email", "workflow"]);
        assert_eq!(config.store.backend, StoreBackend::Keyring);
    }

    #[test]
    fn test_default_credentials_are_empty() {
        let config = AppConfig::default();
        assert!(config.oauth.client_id.is_empty());
        assert!(config.oauth.client_secret.expose_secret().is_empty());
    }

    #[test]
    fn test_config_with_oauth_section() {
        let config = parse(
            r#"
[oauth]
client_id = "Iv1.abc"
client_secret = "shh"
redirect_uri = "oneappstore://oauth-callback"
scopes = ["read:user"]
"#,
        );

        assert_eq!(config.oauth.client_id, "Iv1.abc");
        assert_eq!(config.oauth.client_secret.expose_secret(), "shh");
        assert_eq!(config.oauth.redirect_uri, "oneappstore://oauth-callback");
        assert_eq!(config.oauth.scopes, vec!["read:user"]);
        // Untouched sections keep their defaults
        assert_eq!(config.github.stable_branch, "main");
    }

    #[test]
    fn test_debug_output_redacts_client_secret() {
        let config = parse(
            r#"
[oauth]
client_secret = "super-secret-value"
"#,
        );
        let debug = format!("{:?}", config.oauth);
        assert!(!debug.contains("super-secret-value"));
    }

    #[test]
    fn test_branch_for_channel() {
        let config = parse(
            r#"
[github]
repository = "octocat/apps"
store_repository = "oneapp/store"
beta_branch = "beta"
"#,
        );

        assert_eq!(config.github.repository.as_deref(), Some("octocat/apps"));
        assert_eq!(config.github.store_repository.as_deref(), Some("oneapp/store"));
        assert_eq!(config.github.branch_for(ReleaseChannel::Stable), "main");
        assert_eq!(config.github.branch_for(ReleaseChannel::Beta), "beta");
    }

    #[test]
    fn test_store_backend_parsing() {
        let config = parse(
            r#"
[store]
backend = "file"
path = "/tmp/oneapp-session.json"
"#,
        );

        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(
            config.store.path,
            Some(PathBuf::from("/tmp/oneapp-session.json"))
        );
    }

    #[test]
    #[serial]
    fn test_env_overrides_scopes_and_backend() {
        unsafe {
            std::env::set_var("ONEAPP_OAUTH__SCOPES", "repo read:user");
            std::env::set_var("ONEAPP_STORE__BACKEND", "memory");
        }

        let config = load_config();

        unsafe {
            std::env::remove_var("ONEAPP_OAUTH__SCOPES");
            std::env::remove_var("ONEAPP_STORE__BACKEND");
        }

        let config = config.expect("should load with env overrides");
        assert_eq!(config.oauth.scopes, vec!["repo", "read:user"]);
        assert_eq!(config.store.backend, StoreBackend::Memory);
    }

    #[test]
    #[serial]
    fn test_config_dir_respects_xdg_config_home() {
        let original = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", "/custom/config");
        }

        let dir = config_dir();
        assert_eq!(dir, PathBuf::from("/custom/config/oneapp"));

        unsafe {
            match original {
                Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
                None => std::env::remove_var("XDG_CONFIG_HOME"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_data_dir_ignores_empty_xdg_data_home() {
        let original = std::env::var("XDG_DATA_HOME").ok();
        unsafe {
            std::env::set_var("XDG_DATA_HOME", "");
        }

        let dir = data_dir();
        assert!(dir.ends_with("oneapp"));

        unsafe {
            match original {
                Some(val) => std::env::set_var("XDG_DATA_HOME", val),
                None => std::env::remove_var("XDG_DATA_HOME"),
            }
        }
    }

    #[test]
    fn test_config_file_path() {
        let path = config_file_path();
        assert!(path.ends_with("config.toml"));
    }
}
