// SPDX-License-Identifier: Apache-2.0

//! Token store abstraction for credential persistence.
//!
//! This module defines the `TokenStore` trait, which abstracts where the
//! OAuth access token and the cached developer profile live. Each host picks
//! a backend:
//! - **Memory:** process-local, used by tests and one-shot invocations
//! - **File:** JSON session file in the data directory
//! - **Keyring:** system credential store (feature `keyring`)
//!
//! Stores are synchronous and never touch the network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use secrecy::{ExposeSecret, SecretString};

use crate::config::{StoreBackend, StoreConfig, data_dir};
use crate::error::{OneAppError, StoreError};
use crate::model::DeveloperProfile;
use crate::session::FileTokenStore;

/// Key of the access token.
pub const TOKEN_KEY: &str = "github_token";

/// Key of the cached developer profile (stored as JSON).
pub const PROFILE_KEY: &str = "developer_profile";

/// Persists the access token and the cached developer profile.
///
/// Implementations must make `clear()` all-or-nothing from the caller's point
/// of view: afterwards both `load()` and `load_profile()` return `None`.
pub trait TokenStore: Send + Sync {
    /// Stores the access token, replacing any previous one.
    fn save(&self, token: &SecretString) -> Result<(), StoreError>;

    /// Returns the stored access token.
    fn load(&self) -> Result<Option<SecretString>, StoreError>;

    /// Caches the developer profile.
    fn save_profile(&self, profile: &DeveloperProfile) -> Result<(), StoreError>;

    /// Returns the cached developer profile.
    fn load_profile(&self) -> Result<Option<DeveloperProfile>, StoreError>;

    /// Removes both the token and the profile.
    fn clear(&self) -> Result<(), StoreError>;

    /// Returns true if a non-empty token is stored.
    ///
    /// Read errors count as "not authenticated".
    fn has_token(&self) -> bool {
        matches!(self.load(), Ok(Some(token)) if !token.expose_secret().is_empty())
    }
}

/// Token store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<&'static str, String>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<&'static str, String>> {
        // A panic while holding the lock cannot leave the map half-written.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, token: &SecretString) -> Result<(), StoreError> {
        self.entries()
            .insert(TOKEN_KEY, token.expose_secret().to_string());
        Ok(())
    }

    fn load(&self) -> Result<Option<SecretString>, StoreError> {
        Ok(self
            .entries()
            .get(TOKEN_KEY)
            .map(|t| SecretString::from(t.clone())))
    }

    fn save_profile(&self, profile: &DeveloperProfile) -> Result<(), StoreError> {
        let json = serde_json::to_string(profile)?;
        self.entries().insert(PROFILE_KEY, json);
        Ok(())
    }

    fn load_profile(&self) -> Result<Option<DeveloperProfile>, StoreError> {
        self.entries()
            .get(PROFILE_KEY)
            .map(|json| serde_json::from_str(json))
            .transpose()
            .map_err(StoreError::from)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.entries().clear();
        Ok(())
    }
}

/// Opens the token store selected in the configuration.
///
/// # Errors
///
/// Returns `OneAppError::Config` if the keyring backend is selected but the
/// crate was built without the `keyring` feature.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn TokenStore>, OneAppError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryTokenStore::new())),
        StoreBackend::File => {
            let path = config
                .path
                .clone()
                .unwrap_or_else(|| data_dir().join("session.json"));
            Ok(Arc::new(FileTokenStore::new(path)))
        }
        #[cfg(feature = "keyring")]
        StoreBackend::Keyring => Ok(Arc::new(crate::github::auth::KeyringTokenStore::new())),
        #[cfg(not(feature = "keyring"))]
        StoreBackend::Keyring => Err(OneAppError::Config {
            message: "the keyring token store is not available in this build; \
                      set store.backend = \"file\""
                .to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> DeveloperProfile {
        DeveloperProfile {
            id: "42".to_string(),
            github_username: "dev1".to_string(),
            display_name: "Dev One".to_string(),
            ..DeveloperProfile::default()
        }
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryTokenStore::new();
        assert!(store.load().unwrap().is_none());
        assert!(!store.has_token());

        store.save(&SecretString::from("tok_1")).unwrap();
        store.save_profile(&profile()).unwrap();

        assert_eq!(store.load().unwrap().unwrap().expose_secret(), "tok_1");
        assert_eq!(store.load_profile().unwrap(), Some(profile()));
        assert!(store.has_token());
    }

    #[test]
    fn test_memory_store_last_write_wins() {
        let store = MemoryTokenStore::new();
        store.save(&SecretString::from("tok_1")).unwrap();
        store.save(&SecretString::from("tok_2")).unwrap();
        assert_eq!(store.load().unwrap().unwrap().expose_secret(), "tok_2");
    }

    #[test]
    fn test_memory_store_clear_removes_everything() {
        let store = MemoryTokenStore::new();
        store.save(&SecretString::from("tok_1")).unwrap();
        store.save_profile(&profile()).unwrap();

        store.clear().unwrap();

        assert!(!store.has_token());
        assert!(store.load_profile().unwrap().is_none());
    }

    #[test]
    fn test_empty_token_is_not_authenticated() {
        let store = MemoryTokenStore::new();
        store.save(&SecretString::from("")).unwrap();
        assert!(!store.has_token());
    }

    #[test]
    fn test_open_store_memory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let memory = open_store(&StoreConfig {
            backend: StoreBackend::Memory,
            path: None,
        })
        .unwrap();
        assert!(!memory.has_token());

        let file = open_store(&StoreConfig {
            backend: StoreBackend::File,
            path: Some(dir.path().join("session.json")),
        })
        .unwrap();
        file.save(&SecretString::from("tok_1")).unwrap();
        assert!(dir.path().join("session.json").exists());
    }
}
