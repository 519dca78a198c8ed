// SPDX-License-Identifier: Apache-2.0

//! Command handlers for the OneApp CLI.

pub mod app;
pub mod auth;
pub mod completion;
pub mod package;
pub mod profile;
pub mod release;
pub mod repo;
pub mod types;

use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use oneapp_core::{AppConfig, DeveloperRepositoryService, open_store};
use tracing::debug;

use crate::cli::{
    AppCommand, AuthCommand, Commands, CompletionCommand, OutputContext, PackageCommand,
    ProfileCommand, ReleaseCommand, RepoCommand,
};
use crate::output;

/// Creates a styled spinner (only if interactive).
fn maybe_spinner(ctx: &OutputContext, message: &str) -> Option<ProgressBar> {
    if ctx.is_interactive() {
        let s = ProgressBar::new_spinner();
        s.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("Invalid spinner template"),
        );
        s.set_message(message.to_string());
        s.enable_steady_tick(Duration::from_millis(100));
        Some(s)
    } else {
        None
    }
}

/// Runs `fut` behind a spinner, clearing it whatever the outcome.
async fn with_spinner<T>(
    ctx: &OutputContext,
    message: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    let spinner = maybe_spinner(ctx, message);
    let result = fut.await;
    if let Some(s) = spinner {
        s.finish_and_clear();
    }
    result
}

/// Builds the service over the configured token store.
fn service(config: &AppConfig) -> Result<DeveloperRepositoryService> {
    let store = open_store(&config.store).context("Failed to open token store")?;
    DeveloperRepositoryService::new(config, store).context("Failed to initialize GitHub client")
}

/// Profile id of the signed-in developer, fetching the profile if none is cached.
async fn developer_id(service: &DeveloperRepositoryService) -> Result<String> {
    if let Some(profile) = service.profile()? {
        return Ok(profile.id);
    }
    debug!("No cached profile, fetching from GitHub");
    let profile = service.refresh_profile().await?;
    Ok(profile.id)
}

/// Dispatch to the appropriate command handler.
pub async fn run(command: Commands, ctx: OutputContext, config: &AppConfig) -> Result<()> {
    match command {
        Commands::Auth(auth_cmd) => {
            let service = service(config)?;
            match auth_cmd {
                AuthCommand::Login { paste } => {
                    let result = auth::run_login(&service, paste, &ctx).await?;
                    output::render(&result, &ctx)
                }
                AuthCommand::Logout => {
                    let result = auth::run_logout(&service)?;
                    output::render(&result, &ctx)
                }
                AuthCommand::Status => {
                    let result = with_spinner(
                        &ctx,
                        "Checking GitHub...",
                        auth::run_status(&service, config),
                    )
                    .await?;
                    output::render(&result, &ctx)
                }
            }
        }

        Commands::Profile(ProfileCommand::Show { refresh }) => {
            let service = service(config)?;
            let result =
                with_spinner(&ctx, "Loading profile...", profile::run_show(&service, refresh))
                    .await?;
            output::render(&result, &ctx)
        }

        Commands::App(app_cmd) => {
            let service = service(config)?;
            match app_cmd {
                AppCommand::List { channel } => {
                    let result =
                        with_spinner(&ctx, "Fetching apps...", app::run_list(&service, channel))
                            .await?;
                    output::render(&result, &ctx)
                }
                AppCommand::Show { app_id, channel } => {
                    let result = with_spinner(
                        &ctx,
                        "Fetching app...",
                        app::run_show(&service, &app_id, channel),
                    )
                    .await?;
                    output::render(&result, &ctx)
                }
                AppCommand::Create {
                    app_id,
                    fields,
                    channel,
                } => {
                    let result = with_spinner(
                        &ctx,
                        "Creating app...",
                        app::run_create(&service, &app_id, fields, channel),
                    )
                    .await?;
                    output::render(&result, &ctx)
                }
                AppCommand::Update {
                    app_id,
                    fields,
                    channel,
                } => {
                    let result = with_spinner(
                        &ctx,
                        "Updating app...",
                        app::run_update(&service, &app_id, fields, channel),
                    )
                    .await?;
                    output::render(&result, &ctx)
                }
                AppCommand::Delete {
                    app_id,
                    yes,
                    channel,
                } => {
                    if !app::confirm_delete(&app_id, yes, &ctx)? {
                        return Ok(());
                    }
                    let result = with_spinner(
                        &ctx,
                        "Deleting app...",
                        app::run_delete(&service, &app_id, channel),
                    )
                    .await?;
                    output::render(&result, &ctx)
                }
            }
        }

        Commands::Package(PackageCommand::Upload {
            app_id,
            file,
            platform,
            name,
            channel,
        }) => {
            let service = service(config)?;
            let request = package::UploadRequest {
                app_id,
                file,
                platform: platform.into(),
                name,
                channel: channel.channel.into(),
            };
            let result = with_spinner(
                &ctx,
                "Uploading package...",
                package::run_upload(&service, request),
            )
            .await?;
            output::render(&result, &ctx)
        }

        Commands::Release(ReleaseCommand::Publish {
            app_id,
            version,
            notes,
            notes_file,
            channel,
        }) => {
            let service = service(config)?;
            let notes = release::resolve_notes(notes, notes_file.as_deref())?;
            let result = with_spinner(
                &ctx,
                "Publishing release...",
                release::run_publish(&service, &app_id, &version, &notes, channel),
            )
            .await?;
            output::render(&result, &ctx)
        }

        Commands::Repo(repo_cmd) => {
            let service = service(config)?;
            match repo_cmd {
                RepoCommand::Create { private } => {
                    let result = with_spinner(
                        &ctx,
                        "Creating repository...",
                        repo::run_create(&service, private),
                    )
                    .await?;
                    output::render(&result, &ctx)
                }
                RepoCommand::Setup => {
                    let result =
                        with_spinner(&ctx, "Setting up directories...", repo::run_setup(&service))
                            .await?;
                    output::render(&result, &ctx)
                }
                RepoCommand::Link { url } => {
                    let result = with_spinner(
                        &ctx,
                        "Linking into the store index...",
                        repo::run_link(&service, url),
                    )
                    .await?;
                    output::render(&result, &ctx)
                }
                RepoCommand::Sync => {
                    let result =
                        with_spinner(&ctx, "Updating submodule...", repo::run_sync(&service))
                            .await?;
                    output::render(&result, &ctx)
                }
            }
        }

        Commands::Completion(completion_cmd) => match completion_cmd {
            CompletionCommand::Generate { shell } => completion::run_generate(shell),
            CompletionCommand::Install { shell, dry_run } => {
                completion::run_install(shell, dry_run)
            }
        },
    }
}
