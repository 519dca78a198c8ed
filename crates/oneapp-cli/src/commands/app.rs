// SPDX-License-Identifier: Apache-2.0

//! App metadata commands.

use anyhow::{Context, Result, bail};
use dialoguer::Confirm;
use oneapp_core::{AppMetadata, DeveloperRepositoryService, ReleaseChannel};
use tracing::debug;

use super::developer_id;
use super::types::{AppListResult, AppResult, AppWriteResult};
use crate::cli::{AppFields, ChannelArg, OutputContext};

const DEFAULT_VERSION: &str = "0.1.0";

/// Lists the developer's apps on a channel.
pub async fn run_list(
    service: &DeveloperRepositoryService,
    channel: ChannelArg,
) -> Result<AppListResult> {
    let channel: ReleaseChannel = channel.channel.into();
    let developer_id = developer_id(service).await?;
    let apps = service.list_apps(&developer_id, channel).await?;
    Ok(AppListResult { channel, apps })
}

/// Fetches one app.
pub async fn run_show(
    service: &DeveloperRepositoryService,
    app_id: &str,
    channel: ChannelArg,
) -> Result<AppResult> {
    let channel: ReleaseChannel = channel.channel.into();
    let developer_id = developer_id(service).await?;
    let Some(app) = service.get_app(&developer_id, app_id, channel).await? else {
        bail!("App '{app_id}' not found on the {channel} channel");
    };
    Ok(AppResult { channel, app })
}

/// Publishes metadata for a new app.
pub async fn run_create(
    service: &DeveloperRepositoryService,
    app_id: &str,
    fields: AppFields,
    channel: ChannelArg,
) -> Result<AppWriteResult> {
    let channel: ReleaseChannel = channel.channel.into();
    let developer_id = developer_id(service).await?;
    let app = build_app(app_id, &developer_id, fields)?;
    let commit = service.create_app(&developer_id, &app, channel).await?;
    Ok(AppWriteResult {
        action: "created",
        app_id: app.id,
        channel,
        commit_sha: Some(commit.commit_sha),
    })
}

/// Applies the given fields to an existing app.
pub async fn run_update(
    service: &DeveloperRepositoryService,
    app_id: &str,
    fields: AppFields,
    channel: ChannelArg,
) -> Result<AppWriteResult> {
    let channel: ReleaseChannel = channel.channel.into();
    let developer_id = developer_id(service).await?;
    let Some(mut app) = service.get_app(&developer_id, app_id, channel).await? else {
        bail!("App '{app_id}' not found on the {channel} channel");
    };
    if !apply_fields(&mut app, fields) {
        bail!("Nothing to update. Pass at least one field, e.g. --version 1.1.0");
    }
    let commit = service.update_app(&developer_id, &app, channel).await?;
    Ok(AppWriteResult {
        action: "updated",
        app_id: app.id,
        channel,
        commit_sha: Some(commit.commit_sha),
    })
}

/// Removes an app's metadata.
pub async fn run_delete(
    service: &DeveloperRepositoryService,
    app_id: &str,
    channel: ChannelArg,
) -> Result<AppWriteResult> {
    let channel: ReleaseChannel = channel.channel.into();
    let developer_id = developer_id(service).await?;
    service.delete_app(&developer_id, app_id, channel).await?;
    Ok(AppWriteResult {
        action: "deleted",
        app_id: app_id.to_string(),
        channel,
        commit_sha: None,
    })
}

/// Asks before deleting unless `yes` is set.
///
/// Fails rather than prompting when the session is not interactive.
pub fn confirm_delete(app_id: &str, yes: bool, ctx: &OutputContext) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        bail!("Refusing to delete '{app_id}' without confirmation. Pass --yes to proceed.");
    }
    let confirmed = Confirm::new()
        .with_prompt(format!("Delete app '{app_id}'? Uploaded packages are kept."))
        .default(false)
        .interact()
        .context("Failed to read confirmation")?;
    if !confirmed {
        debug!("User cancelled deletion");
    }
    Ok(confirmed)
}

/// Builds new metadata from command-line fields.
fn build_app(app_id: &str, developer_id: &str, fields: AppFields) -> Result<AppMetadata> {
    let Some(name) = fields.name else {
        bail!("--name is required when creating an app");
    };
    let Some(description) = fields.description else {
        bail!("--description is required when creating an app");
    };
    let Some(category) = fields.category else {
        bail!("--category is required when creating an app");
    };
    let short_description = fields
        .short_description
        .unwrap_or_else(|| first_line(&description).to_string());

    Ok(AppMetadata::builder()
        .id(app_id)
        .name(name)
        .description(description)
        .short_description(short_description)
        .version(fields.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()))
        .developer_id(developer_id)
        .category(category)
        .tags(fields.tags)
        .icon_url(fields.icon_url.unwrap_or_default())
        .website_url(fields.website_url.unwrap_or_default())
        .privacy_policy_url(fields.privacy_policy_url.unwrap_or_default())
        .support_email(fields.support_email.unwrap_or_default())
        .build())
}

/// Overwrites the fields that were given. Returns false if none were.
fn apply_fields(app: &mut AppMetadata, fields: AppFields) -> bool {
    let mut changed = false;
    let mut set = |target: &mut String, value: Option<String>| {
        if let Some(value) = value {
            *target = value;
            changed = true;
        }
    };
    set(&mut app.name, fields.name);
    set(&mut app.description, fields.description);
    set(&mut app.short_description, fields.short_description);
    set(&mut app.category, fields.category);
    set(&mut app.version, fields.version);
    set(&mut app.icon_url, fields.icon_url);
    set(&mut app.website_url, fields.website_url);
    set(&mut app.privacy_policy_url, fields.privacy_policy_url);
    set(&mut app.support_email, fields.support_email);
    if !fields.tags.is_empty() {
        app.tags = fields.tags;
        changed = true;
    }
    changed
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> AppFields {
        AppFields {
            name: Some("Notes".to_string()),
            description: Some("Take notes.\nSyncs everywhere.".to_string()),
            category: Some("productivity".to_string()),
            ..AppFields::default()
        }
    }

    #[test]
    fn test_build_app_defaults() {
        let app = build_app("notes", "42", fields()).unwrap();
        assert_eq!(app.id, "notes");
        assert_eq!(app.developer_id, "42");
        assert_eq!(app.version, "0.1.0");
        assert_eq!(app.short_description, "Take notes.");
        assert!(app.platforms.is_empty());
    }

    #[test]
    fn test_build_app_requires_name() {
        let err = build_app(
            "notes",
            "42",
            AppFields {
                name: None,
                ..fields()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("--name"));
    }

    #[test]
    fn test_apply_fields_only_given() {
        let mut app = build_app("notes", "42", fields()).unwrap();
        let changed = apply_fields(
            &mut app,
            AppFields {
                version: Some("1.1.0".to_string()),
                ..AppFields::default()
            },
        );
        assert!(changed);
        assert_eq!(app.version, "1.1.0");
        assert_eq!(app.name, "Notes");
    }

    #[test]
    fn test_apply_fields_nothing_given() {
        let mut app = build_app("notes", "42", fields()).unwrap();
        assert!(!apply_fields(&mut app, AppFields::default()));
    }

    #[test]
    fn test_confirm_delete_non_interactive() {
        let ctx = OutputContext {
            format: crate::cli::OutputFormat::Json,
            quiet: false,
            verbose: false,
            is_tty: false,
        };
        assert!(confirm_delete("notes", true, &ctx).unwrap());
        let err = confirm_delete("notes", false, &ctx).unwrap_err();
        assert!(err.to_string().contains("--yes"));
    }
}
