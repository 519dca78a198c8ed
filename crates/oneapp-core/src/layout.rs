// SPDX-License-Identifier: Apache-2.0

//! Storage repository layout.
//!
//! ```text
//! <developer_id>/README.md
//! <developer_id>/<channel>/apps/.gitkeep
//! <developer_id>/<channel>/apps/<app_id>/metadata.json
//! <developer_id>/<channel>/apps/<app_id>/packages/<platform>/<file_name>
//! ```
//!
//! The store index repository links each developer's storage repository as a
//! submodule:
//!
//! ```text
//! .gitmodules
//! developers/<developer_id>
//! ```

use crate::error::OneAppError;
use crate::model::{PlatformType, ReleaseChannel};

/// File name of an app's listing inside its directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Submodule registry at the root of the store index repository.
pub const GITMODULES_FILE: &str = ".gitmodules";

/// Checks that `value` can be used as a single path segment.
pub fn validate_segment<'a>(kind: &str, value: &'a str) -> Result<&'a str, OneAppError> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\'])
        || value.chars().any(char::is_control)
    {
        return Err(OneAppError::invalid_input(format!(
            "{kind} '{value}' cannot be used as a path segment"
        )));
    }
    Ok(value)
}

/// Directory holding a developer's files.
pub fn developer_dir(developer_id: &str) -> Result<String, OneAppError> {
    Ok(validate_segment("developer id", developer_id)?.to_string())
}

/// Directory holding all apps of a developer on a channel.
pub fn apps_dir(developer_id: &str, channel: ReleaseChannel) -> Result<String, OneAppError> {
    Ok(format!(
        "{}/{}/apps",
        developer_dir(developer_id)?,
        channel.path_segment()
    ))
}

/// Directory of one app.
pub fn app_dir(
    developer_id: &str,
    app_id: &str,
    channel: ReleaseChannel,
) -> Result<String, OneAppError> {
    Ok(format!(
        "{}/{}",
        apps_dir(developer_id, channel)?,
        validate_segment("app id", app_id)?
    ))
}

/// Path of an app's `metadata.json`.
pub fn metadata_path(
    developer_id: &str,
    app_id: &str,
    channel: ReleaseChannel,
) -> Result<String, OneAppError> {
    Ok(format!(
        "{}/{METADATA_FILE}",
        app_dir(developer_id, app_id, channel)?
    ))
}

/// Path of an uploaded package.
pub fn package_path(
    developer_id: &str,
    app_id: &str,
    platform: PlatformType,
    file_name: &str,
    channel: ReleaseChannel,
) -> Result<String, OneAppError> {
    Ok(format!(
        "{}/packages/{}/{}",
        app_dir(developer_id, app_id, channel)?,
        platform.as_str(),
        validate_segment("file name", file_name)?
    ))
}

/// Where a developer's repository is linked in the store index repository.
pub fn submodule_path(developer_id: &str) -> Result<String, OneAppError> {
    Ok(format!("developers/{}", developer_dir(developer_id)?))
}

/// Canonical form of a release version: trimmed, without a leading `v`.
pub fn release_version(version: &str) -> Result<&str, OneAppError> {
    let trimmed = version.trim();
    let version = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if version.is_empty() || version.contains(char::is_whitespace) {
        return Err(OneAppError::invalid_input(format!(
            "version '{trimmed}' cannot be used in a tag"
        )));
    }
    Ok(version)
}

/// Git tag of a release; beta tags carry a `-beta` suffix so both channels
/// can publish the same version.
pub fn release_tag(app_id: &str, version: &str, channel: ReleaseChannel) -> Result<String, OneAppError> {
    let app_id = validate_segment("app id", app_id)?;
    let version = release_version(version)?;
    Ok(match channel {
        ReleaseChannel::Stable => format!("{app_id}-v{version}"),
        ReleaseChannel::Beta => format!("{app_id}-v{version}-beta"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_path() {
        assert_eq!(
            metadata_path("42", "notes", ReleaseChannel::Beta).unwrap(),
            "42/beta/apps/notes/metadata.json"
        );
    }

    #[test]
    fn test_package_path() {
        assert_eq!(
            package_path(
                "42",
                "notes",
                PlatformType::Android,
                "notes-1.0.apk",
                ReleaseChannel::Stable
            )
            .unwrap(),
            "42/stable/apps/notes/packages/android/notes-1.0.apk"
        );
    }

    #[test]
    fn test_rejects_traversal_segments() {
        assert!(app_dir("42", "..", ReleaseChannel::Stable).is_err());
        assert!(app_dir("42", "a/b", ReleaseChannel::Stable).is_err());
        assert!(apps_dir("", ReleaseChannel::Stable).is_err());
        assert!(
            package_path("42", "notes", PlatformType::Web, "x\\y", ReleaseChannel::Stable)
                .is_err()
        );
    }

    #[test]
    fn test_release_tag() {
        assert_eq!(
            release_tag("notes", "1.2.0", ReleaseChannel::Stable).unwrap(),
            "notes-v1.2.0"
        );
        assert_eq!(
            release_tag("notes", "v1.2.0", ReleaseChannel::Beta).unwrap(),
            "notes-v1.2.0-beta"
        );
        assert!(release_tag("notes", "1 2", ReleaseChannel::Stable).is_err());
        assert!(release_tag("notes", " ", ReleaseChannel::Stable).is_err());
    }

    #[test]
    fn test_submodule_path() {
        assert_eq!(submodule_path("42").unwrap(), "developers/42");
        assert!(submodule_path("../42").is_err());
    }

    #[test]
    fn test_release_version_strips_prefix() {
        assert_eq!(release_version(" v2.0.0 ").unwrap(), "2.0.0");
        assert_eq!(release_version("2.0.0").unwrap(), "2.0.0");
        assert!(release_version("v").is_err());
    }
}
