// SPDX-License-Identifier: Apache-2.0

//! App store domain types.
//!
//! These are serialized in camelCase, which is the on-disk format of
//! `metadata.json` files in the storage repository and of the cached profile.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::OneAppError;

/// A developer's public profile, derived from their GitHub account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeveloperProfile {
    /// Stable identity key (the GitHub user id).
    pub id: String,
    /// GitHub login.
    pub github_username: String,
    /// Display name, falling back to the login.
    pub display_name: String,
    /// Avatar image URL.
    pub avatar_url: String,
    /// Profile bio.
    #[serde(default)]
    pub bio: String,
    /// Public email address.
    #[serde(default)]
    pub email: String,
    /// Personal website.
    #[serde(default)]
    pub website: String,
    /// Profile page on GitHub.
    #[serde(default)]
    pub github_repo_url: String,
    /// Whether the store has verified this developer.
    #[serde(default)]
    pub is_verified: bool,
}

/// Platforms an app can ship on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    /// Android (APK/AAB).
    Android,
    /// iOS (IPA).
    #[serde(rename = "ios")]
    IOS,
    /// Windows.
    Windows,
    /// Linux.
    Linux,
    /// macOS.
    #[serde(rename = "macos")]
    MacOS,
    /// Web.
    Web,
}

impl PlatformType {
    /// All platforms, in display order.
    pub const ALL: [PlatformType; 6] = [
        PlatformType::Android,
        PlatformType::IOS,
        PlatformType::Windows,
        PlatformType::Linux,
        PlatformType::MacOS,
        PlatformType::Web,
    ];

    /// Lowercase identifier, also used as a path segment.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::Android => "android",
            PlatformType::IOS => "ios",
            PlatformType::Windows => "windows",
            PlatformType::Linux => "linux",
            PlatformType::MacOS => "macos",
            PlatformType::Web => "web",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = OneAppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        PlatformType::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| {
                OneAppError::invalid_input(format!(
                    "unknown platform '{s}' (expected one of: android, ios, windows, linux, macos, web)"
                ))
            })
    }
}

/// Logical partition of published app versions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseChannel {
    /// Production releases.
    #[default]
    Stable,
    /// Pre-releases.
    Beta,
}

impl ReleaseChannel {
    /// Path segment under the developer directory.
    #[must_use]
    pub fn path_segment(&self) -> &'static str {
        match self {
            ReleaseChannel::Stable => "stable",
            ReleaseChannel::Beta => "beta",
        }
    }

    /// Whether releases on this channel are marked as GitHub pre-releases.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        matches!(self, ReleaseChannel::Beta)
    }
}

impl fmt::Display for ReleaseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

impl FromStr for ReleaseChannel {
    type Err = OneAppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stable" => Ok(ReleaseChannel::Stable),
            "beta" => Ok(ReleaseChannel::Beta),
            _ => Err(OneAppError::invalid_input(format!(
                "unknown release channel '{s}' (expected stable or beta)"
            ))),
        }
    }
}

/// A downloadable build of an app for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPlatform {
    /// Target platform.
    #[serde(rename = "type")]
    pub platform: PlatformType,
    /// Download URL of the package.
    #[serde(default)]
    pub package_url: String,
    /// Package size in bytes.
    #[serde(default)]
    pub package_size: u64,
    /// Free-form install instructions.
    #[serde(default)]
    pub install_instructions: String,
}

/// Store listing for one app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    /// App identifier, unique per developer.
    #[builder(into)]
    pub id: String,
    /// Display name.
    #[builder(into)]
    pub name: String,
    /// Long description.
    #[builder(into)]
    pub description: String,
    /// One-line summary.
    #[builder(into)]
    pub short_description: String,
    /// Current version.
    #[builder(into)]
    pub version: String,
    /// Owning developer's profile id.
    #[builder(into)]
    pub developer_id: String,
    /// Store category.
    #[builder(into)]
    pub category: String,
    /// Search tags.
    #[serde(default)]
    #[builder(default)]
    pub tags: Vec<String>,
    /// Icon URL.
    #[serde(default)]
    #[builder(default, into)]
    pub icon_url: String,
    /// Screenshot URLs.
    #[serde(default)]
    #[builder(default)]
    pub screenshot_urls: Vec<String>,
    /// Project website.
    #[serde(default)]
    #[builder(default, into)]
    pub website_url: String,
    /// Privacy policy.
    #[serde(default)]
    #[builder(default, into)]
    pub privacy_policy_url: String,
    /// Support contact.
    #[serde(default)]
    #[builder(default, into)]
    pub support_email: String,
    /// Notes of the latest release.
    #[serde(default)]
    #[builder(default, into)]
    pub release_notes: String,
    /// RFC 3339 timestamp of the latest release.
    #[serde(default)]
    #[builder(default, into)]
    pub release_date: String,
    /// Minimum OS/SDK version per platform key.
    #[serde(default)]
    #[builder(default)]
    pub min_sdk_version: BTreeMap<String, String>,
    /// Supported platforms.
    #[serde(default)]
    #[builder(default)]
    pub platforms: Vec<AppPlatform>,
}

impl AppMetadata {
    /// Records a package for `platform`, replacing any previous entry for it.
    ///
    /// Install instructions of an existing entry are kept.
    pub fn upsert_platform(&mut self, platform: PlatformType, package_url: &str, package_size: u64) {
        if let Some(existing) = self.platforms.iter_mut().find(|p| p.platform == platform) {
            existing.package_url = package_url.to_string();
            existing.package_size = package_size;
        } else {
            self.platforms.push(AppPlatform {
                platform,
                package_url: package_url.to_string(),
                package_size,
                install_instructions: String::new(),
            });
        }
    }

    /// Returns the entry for `platform`, if any.
    #[must_use]
    pub fn platform(&self, platform: PlatformType) -> Option<&AppPlatform> {
        self.platforms.iter().find(|p| p.platform == platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_app() -> AppMetadata {
        AppMetadata::builder()
            .id("notes")
            .name("Notes")
            .description("Take notes")
            .short_description("Notes app")
            .version("1.0.0")
            .developer_id("42")
            .category("productivity")
            .build()
    }

    #[test]
    fn test_builder_defaults_optional_fields() {
        let app = sample_app();
        assert!(app.tags.is_empty());
        assert!(app.platforms.is_empty());
        assert_eq!(app.release_notes, "");
        assert!(app.min_sdk_version.is_empty());
    }

    #[test]
    fn test_metadata_uses_camel_case() {
        let json = serde_json::to_value(sample_app()).unwrap();
        assert_eq!(json["shortDescription"], "Notes app");
        assert_eq!(json["developerId"], "42");
        assert!(json.get("short_description").is_none());
    }

    #[test]
    fn test_metadata_missing_optional_fields_deserialize() {
        let json = r#"{
            "id": "notes",
            "name": "Notes",
            "description": "Take notes",
            "shortDescription": "Notes app",
            "version": "1.0.0",
            "developerId": "42",
            "category": "productivity",
            "platforms": [{"type": "android", "packageUrl": "u", "packageSize": 10}]
        }"#;
        let app: AppMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(app.platforms.len(), 1);
        assert_eq!(app.platforms[0].platform, PlatformType::Android);
        assert_eq!(app.platforms[0].install_instructions, "");
        assert!(app.screenshot_urls.is_empty());
    }

    #[test]
    fn test_upsert_platform_replaces_existing_entry() {
        let mut app = sample_app();
        app.upsert_platform(PlatformType::Linux, "https://x/v1.tar.gz", 100);
        app.platforms[0].install_instructions = "untar it".to_string();
        app.upsert_platform(PlatformType::Linux, "https://x/v2.tar.gz", 200);
        app.upsert_platform(PlatformType::Web, "https://x/web.zip", 5);

        assert_eq!(app.platforms.len(), 2);
        let linux = app.platform(PlatformType::Linux).unwrap();
        assert_eq!(linux.package_url, "https://x/v2.tar.gz");
        assert_eq!(linux.package_size, 200);
        assert_eq!(linux.install_instructions, "untar it");
    }

    #[test]
    fn test_platform_type_parsing() {
        assert_eq!("iOS".parse::<PlatformType>().unwrap(), PlatformType::IOS);
        assert_eq!("macos".parse::<PlatformType>().unwrap(), PlatformType::MacOS);
        assert!("amiga".parse::<PlatformType>().is_err());
        assert_eq!(
            serde_json::to_string(&PlatformType::MacOS).unwrap(),
            "\"macos\""
        );
    }

    #[test]
    fn test_release_channel() {
        assert_eq!("BETA".parse::<ReleaseChannel>().unwrap(), ReleaseChannel::Beta);
        assert!("nightly".parse::<ReleaseChannel>().is_err());
        assert!(ReleaseChannel::Beta.is_prerelease());
        assert!(!ReleaseChannel::Stable.is_prerelease());
        assert_eq!(ReleaseChannel::default().to_string(), "stable");
    }

    #[test]
    fn test_profile_defaults_missing_optional_fields() {
        let json = r#"{"id":"1","githubUsername":"a","displayName":"A","avatarUrl":"x"}"#;
        let profile: DeveloperProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.bio, "");
        assert!(!profile.is_verified);
    }
}
