// SPDX-License-Identifier: Apache-2.0

//! The `.gitmodules` registry of the store index repository.
//!
//! Only `[submodule "<name>"]` sections are understood. Keys other than `path`
//! and `url` are kept as written.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::layout::GITMODULES_FILE;

/// A developer repository linked into the store index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleLink {
    /// Submodule path in the store index.
    pub path: String,
    /// Clone URL registered in `.gitmodules`.
    pub url: String,
    /// Commit of the developer repository the submodule points at.
    pub pinned_commit: String,
    /// Store index commit that made the change; `None` if nothing changed.
    pub store_commit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }
}

/// Parsed `.gitmodules` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitModules {
    sections: Vec<Section>,
}

impl GitModules {
    /// Parses the file content.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Malformed` for a line outside any section or one
    /// that is neither a header nor `key = value`.
    pub fn parse(text: &str) -> Result<Self, ApiError> {
        let malformed = |line_no: usize, reason: &str| ApiError::Malformed {
            message: format!("{GITMODULES_FILE} line {line_no}: {reason}"),
        };

        let mut sections: Vec<Section> = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = header
                    .trim()
                    .strip_prefix("submodule")
                    .map(str::trim)
                    .and_then(|n| n.strip_prefix('"'))
                    .and_then(|n| n.strip_suffix('"'))
                    .ok_or_else(|| malformed(i + 1, "expected [submodule \"<name>\"]"))?;
                sections.push(Section {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| malformed(i + 1, "expected key = value"))?;
            let section = sections
                .last_mut()
                .ok_or_else(|| malformed(i + 1, "entry outside a section"))?;
            section
                .entries
                .push((key.trim().to_string(), value.trim().to_string()));
        }
        Ok(Self { sections })
    }

    /// URL registered for the submodule at `path`.
    #[must_use]
    pub fn url_of(&self, path: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.get("path") == Some(path))
            .and_then(|s| s.get("url"))
    }

    /// Registers `url` at `path`, replacing the URL of an existing entry.
    ///
    /// Returns false if `path` already pointed at `url`.
    pub fn upsert(&mut self, path: &str, url: &str) -> bool {
        if let Some(section) = self
            .sections
            .iter_mut()
            .find(|s| s.get("path") == Some(path))
        {
            if section.get("url") == Some(url) {
                return false;
            }
            section.set("url", url);
            return true;
        }
        self.sections.push(Section {
            name: path.to_string(),
            entries: vec![
                ("path".to_string(), path.to_string()),
                ("url".to_string(), url.to_string()),
            ],
        });
        true
    }

    /// Number of registered submodules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Returns true if no submodule is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl fmt::Display for GitModules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "[submodule \"{}\"]", section.name)?;
            for (key, value) in &section.entries {
                writeln!(f, "\t{key} = {value}")?;
            }
        }
        Ok(())
    }
}
