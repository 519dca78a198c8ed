// SPDX-License-Identifier: Apache-2.0

//! Paste-based redirect capture.
//!
//! For machines where a local listener cannot receive the browser redirect
//! (SSH sessions, containers), the user opens the URL elsewhere and pastes
//! the address the browser ended up on, or just the `code` parameter.

use std::io::IsTerminal;

use async_trait::async_trait;
use console::style;
use dialoguer::Input;
use oneapp_core::{AuthError, RedirectHandle, Url, UserAgent};
use tracing::debug;

/// What the user pasted.
#[derive(Debug, PartialEq, Eq)]
pub enum Pasted {
    /// A full redirect URL, validated against the flow's state.
    Url(Url),
    /// A bare authorization code.
    Code(String),
}

/// Interprets pasted text as a redirect URL when it parses as one with a
/// query, otherwise as a bare code.
pub fn parse_pasted(input: &str) -> Option<Pasted> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match Url::parse(input) {
        Ok(url) if url.query().is_some() => Some(Pasted::Url(url)),
        _ => Some(Pasted::Code(input.to_string())),
    }
}

/// Prints the authorization URL and reads the redirect from the terminal.
pub struct PastePrompt;

#[async_trait]
impl UserAgent for PastePrompt {
    async fn open(&self, url: &Url, redirect: RedirectHandle) -> Result<(), AuthError> {
        if !std::io::stdin().is_terminal() {
            redirect.cancel();
            return Err(AuthError::Unknown {
                message: "--paste requires an interactive terminal".to_string(),
            });
        }

        println!();
        println!("Open this URL in a browser and approve access:");
        println!("  {}", style(url).cyan().underlined());
        println!();

        let handle = redirect.clone();
        tokio::task::spawn_blocking(move || {
            let input = Input::<String>::new()
                .with_prompt("Paste the URL you were redirected to (or the code)")
                .interact_text();
            match input.ok().as_deref().and_then(parse_pasted) {
                Some(Pasted::Url(url)) => {
                    debug!("Received pasted redirect URL");
                    handle.deliver_url(&url)
                }
                Some(Pasted::Code(code)) => {
                    debug!("Received pasted code");
                    handle.deliver_code(code)
                }
                None => handle.cancel(),
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pasted_url() {
        let pasted = parse_pasted("  http://127.0.0.1:8765/oauth/callback?code=abc&state=s1 \n");
        let Some(Pasted::Url(url)) = pasted else {
            panic!("expected a URL");
        };
        assert_eq!(url.query(), Some("code=abc&state=s1"));
    }

    #[test]
    fn test_parse_pasted_code() {
        assert_eq!(
            parse_pasted("abc123"),
            Some(Pasted::Code("abc123".to_string()))
        );
    }

    #[test]
    fn test_parse_pasted_empty() {
        assert_eq!(parse_pasted("   "), None);
    }
}
