// SPDX-License-Identifier: Apache-2.0

//! File-backed token store.
//!
//! The session is one JSON object (`{"github_token": ..., "developer_profile": ...}`)
//! that is always rewritten as a whole: the new content goes to a temporary file
//! in the same directory which is then renamed over the old one. Readers never
//! observe a partially written session.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use crate::auth::{PROFILE_KEY, TOKEN_KEY, TokenStore};
use crate::error::StoreError;
use crate::model::DeveloperProfile;

type Session = BTreeMap<String, String>;

/// Token store persisted to a JSON file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileTokenStore {
    /// Creates a store backed by `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Session, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Session::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Session::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, session: &Session) -> Result<(), StoreError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let file_name = self
            .path
            .file_name()
            .map_or_else(|| "session".into(), |n| n.to_string_lossy().into_owned());
        let tmp = dir.join(format!(".{file_name}.{}.tmp", std::process::id()));

        let json = serde_json::to_vec_pretty(session)?;
        {
            let mut file = create_private(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "Session file written");
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut Session) -> Result<(), StoreError>) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut session = self.read()?;
        f(&mut session)?;
        self.write(&session)
    }
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}

impl TokenStore for FileTokenStore {
    #[instrument(skip(self, token), fields(path = %self.path.display()))]
    fn save(&self, token: &SecretString) -> Result<(), StoreError> {
        self.update(|session| {
            session.insert(TOKEN_KEY.to_string(), token.expose_secret().to_string());
            Ok(())
        })
    }

    fn load(&self) -> Result<Option<SecretString>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read()?.remove(TOKEN_KEY).map(SecretString::from))
    }

    #[instrument(skip(self, profile), fields(path = %self.path.display()))]
    fn save_profile(&self, profile: &DeveloperProfile) -> Result<(), StoreError> {
        let json = serde_json::to_string(profile)?;
        self.update(|session| {
            session.insert(PROFILE_KEY.to_string(), json);
            Ok(())
        })
    }

    fn load_profile(&self) -> Result<Option<DeveloperProfile>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read()?
            .get(PROFILE_KEY)
            .map(|json| serde_json::from_str(json))
            .transpose()
            .map_err(StoreError::from)
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
