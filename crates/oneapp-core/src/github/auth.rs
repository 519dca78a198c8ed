// SPDX-License-Identifier: Apache-2.0

//! System keyring token store.
//!
//! Keeps the access token and the cached profile as two keyring entries under
//! the `oneapp` service. Available with the `keyring` feature.

use keyring::Entry;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument};

use super::KEYRING_SERVICE;
use crate::auth::{PROFILE_KEY, TOKEN_KEY, TokenStore};
use crate::error::StoreError;
use crate::model::DeveloperProfile;

/// Token store backed by the system keyring.
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    service: String,
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringTokenStore {
    /// Creates a store using the default `oneapp` service name.
    #[must_use]
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    /// Creates a store under a custom service name.
    #[must_use]
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, key)?)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl TokenStore for KeyringTokenStore {
    #[instrument(skip(self, token))]
    fn save(&self, token: &SecretString) -> Result<(), StoreError> {
        self.entry(TOKEN_KEY)?.set_password(token.expose_secret())?;
        info!("Token stored in system keyring");
        Ok(())
    }

    #[instrument(skip(self))]
    fn load(&self) -> Result<Option<SecretString>, StoreError> {
        let token = self.get(TOKEN_KEY)?.map(SecretString::from);
        if token.is_some() {
            debug!("Retrieved token from keyring");
        }
        Ok(token)
    }

    fn save_profile(&self, profile: &DeveloperProfile) -> Result<(), StoreError> {
        let json = serde_json::to_string(profile)?;
        self.entry(PROFILE_KEY)?.set_password(&json)?;
        Ok(())
    }

    fn load_profile(&self) -> Result<Option<DeveloperProfile>, StoreError> {
        self.get(PROFILE_KEY)?
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    /// Deletes the profile first, then the token. A reader racing this call
    /// sees at worst a token without a profile, which is also the state between
    /// a token exchange and the first profile fetch.
    #[instrument(skip(self))]
    fn clear(&self) -> Result<(), StoreError> {
        self.delete(PROFILE_KEY)?;
        self.delete(TOKEN_KEY)?;
        info!("Credentials deleted from keyring");
        Ok(())
    }
}
