// SPDX-License-Identifier: Apache-2.0

//! GitHub OAuth authentication commands.

use anyhow::Result;
use console::style;
use oneapp_core::{
    AppConfig, AuthState, DeveloperRepositoryService, LoopbackListener, StoreBackend,
};
use tracing::{debug, warn};

use super::maybe_spinner;
use super::types::{AuthStatusResult, LoginResult, LogoutResult};
use crate::cli::OutputContext;
use crate::prompt::PastePrompt;

fn state_message(state: &AuthState) -> &'static str {
    match state {
        AuthState::Idle | AuthState::AwaitingRedirect => "Waiting for GitHub authorization...",
        AuthState::ExchangingCode => "Exchanging authorization code...",
        AuthState::Authenticated => "Loading profile...",
        AuthState::Failed(_) => "Authorization failed",
    }
}

/// Run the login command - authenticate with GitHub.
pub async fn run_login(
    service: &DeveloperRepositoryService,
    paste: bool,
    ctx: &OutputContext,
) -> Result<LoginResult> {
    if service.is_authenticated()
        && let Some(profile) = service.profile()?
    {
        return Ok(LoginResult {
            profile,
            already_authenticated: true,
        });
    }

    let flow = service.oauth().flow();

    if paste {
        let profile = service.authenticate_with(flow, &PastePrompt).await?;
        return Ok(LoginResult {
            profile,
            already_authenticated: false,
        });
    }

    let spinner = maybe_spinner(ctx, state_message(&AuthState::Idle));
    let printer = spinner.clone();
    let listener = LoopbackListener::from_redirect_uri(service.oauth().redirect_uri())?.on_ready(
        move |url| {
            let lines = format!(
                "Open this URL in your browser to authorize OneApp:\n  {}",
                style(url).cyan().underlined()
            );
            match &printer {
                Some(s) => s.println(lines),
                None => eprintln!("{lines}"),
            }
        },
    );

    let progress = spinner.clone().map(|s| {
        let mut states = flow.subscribe();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let message = state_message(&states.borrow_and_update());
                s.set_message(message);
            }
        })
    });

    let result = service.authenticate_with(flow, &listener).await;

    if let Some(task) = progress {
        task.abort();
    }
    if let Some(s) = spinner {
        s.finish_and_clear();
    }

    let profile = result?;
    debug!(login = %profile.github_username, "Login complete");
    Ok(LoginResult {
        profile,
        already_authenticated: false,
    })
}

/// Run the logout command - remove stored credentials.
pub fn run_logout(service: &DeveloperRepositoryService) -> Result<LogoutResult> {
    let was_authenticated = service.is_authenticated();
    service.logout()?;
    Ok(LogoutResult { was_authenticated })
}

/// Run the status command - show current authentication state.
pub async fn run_status(
    service: &DeveloperRepositoryService,
    config: &AppConfig,
) -> Result<AuthStatusResult> {
    let authenticated = service.is_authenticated();
    let backend = backend_name(config.store.backend).to_string();
    if !authenticated {
        return Ok(AuthStatusResult {
            authenticated,
            backend,
            username: None,
            rate_limit: None,
        });
    }

    let username = service.profile()?.map(|p| p.github_username);
    let rate_limit = match service.client()?.check_rate_limit().await {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(error = %e, "Could not fetch rate limit");
            None
        }
    };

    Ok(AuthStatusResult {
        authenticated,
        backend,
        username,
        rate_limit,
    })
}

fn backend_name(backend: StoreBackend) -> &'static str {
    match backend {
        StoreBackend::Keyring => "keyring",
        StoreBackend::File => "file",
        StoreBackend::Memory => "memory",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_messages() {
        assert_eq!(
            state_message(&AuthState::AwaitingRedirect),
            "Waiting for GitHub authorization..."
        );
        assert_eq!(
            state_message(&AuthState::ExchangingCode),
            "Exchanging authorization code..."
        );
    }

    #[test]
    fn test_backend_name() {
        assert_eq!(backend_name(StoreBackend::default()), "keyring");
        assert_eq!(backend_name(StoreBackend::Memory), "memory");
    }
}
