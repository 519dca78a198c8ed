// SPDX-License-Identifier: Apache-2.0

//! Loopback redirect listener.
//!
//! A [`UserAgent`] for native hosts whose OAuth App is registered with an
//! `http://127.0.0.1:<port>/<path>` redirect URI. It serves that one path
//! until the flow moves past the redirect wait, then shuts down. Hits without
//! a `code`/`error` or with another flow's `state` are turned away and the
//! listener keeps waiting.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{RawQuery, State};
use axum::response::Html;
use axum::routing::get;
use reqwest::Url;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use super::oauth::{RedirectHandle, UserAgent};
use crate::error::{AuthError, OneAppError};

const DONE_PAGE: &str = "<!doctype html><html><body>\
    <h1>OneApp</h1><p>Authorization received. You can close this window.</p>\
    </body></html>";

const STALE_PAGE: &str = "<!doctype html><html><body>\
    <h1>OneApp</h1><p>This login attempt is no longer active.</p>\
    </body></html>";

type ReadyCallback = Box<dyn Fn(&Url) + Send + Sync>;

/// Receives the OAuth redirect on a local HTTP port.
pub struct LoopbackListener {
    addr: SocketAddr,
    redirect_uri: Url,
    on_ready: Option<ReadyCallback>,
}

impl std::fmt::Debug for LoopbackListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackListener")
            .field("addr", &self.addr)
            .field("redirect_uri", &self.redirect_uri.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct CallbackState {
    redirect: RedirectHandle,
    redirect_uri: Arc<Url>,
}

impl LoopbackListener {
    /// Creates a listener for a loopback redirect URI.
    ///
    /// # Errors
    ///
    /// Returns `OneAppError::Config` unless the URI is `http` on a loopback
    /// host with an explicit port.
    pub fn from_redirect_uri(redirect_uri: &str) -> Result<Self, OneAppError> {
        let invalid = |reason: &str| OneAppError::Config {
            message: format!("oauth.redirect_uri '{redirect_uri}' {reason}"),
        };

        let url = Url::parse(redirect_uri).map_err(|e| invalid(&format!("is not a URL: {e}")))?;
        if url.scheme() != "http" {
            return Err(invalid("must use http:// for a loopback listener"));
        }
        let ip: IpAddr = match url.host_str() {
            Some("localhost") => IpAddr::from([127, 0, 0, 1]),
            Some(host) => host
                .trim_start_matches('[')
                .trim_end_matches(']')
                .parse()
                .map_err(|_| invalid("must point at a loopback address"))?,
            None => return Err(invalid("has no host")),
        };
        if !ip.is_loopback() {
            return Err(invalid("must point at a loopback address"));
        }
        let port = url.port().ok_or_else(|| invalid("must include a port"))?;

        Ok(Self {
            addr: SocketAddr::new(ip, port),
            redirect_uri: url,
            on_ready: None,
        })
    }

    /// Calls `f` with the authorization URL once the listener is accepting
    /// connections.
    #[must_use]
    pub fn on_ready(mut self, f: impl Fn(&Url) + Send + Sync + 'static) -> Self {
        self.on_ready = Some(Box::new(f));
        self
    }

    /// Socket address the listener binds.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

async fn callback(State(state): State<CallbackState>, RawQuery(query): RawQuery) -> Html<&'static str> {
    let mut url = (*state.redirect_uri).clone();
    url.set_query(query.as_deref());
    if !state.redirect.matches(&url) {
        warn!("Ignoring callback that does not belong to this login attempt");
        return Html(STALE_PAGE);
    }
    if state.redirect.deliver_url(&url) {
        debug!("Delivered OAuth redirect");
        Html(DONE_PAGE)
    } else {
        Html(STALE_PAGE)
    }
}

#[async_trait]
impl UserAgent for LoopbackListener {
    async fn open(&self, url: &Url, redirect: RedirectHandle) -> Result<(), AuthError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| AuthError::Unknown {
                message: format!("failed to listen on {}: {e}", self.addr),
            })?;

        let state = CallbackState {
            redirect: redirect.clone(),
            redirect_uri: Arc::new(self.redirect_uri.clone()),
        };
        let path = self.redirect_uri.path().to_string();
        let router = Router::new().route(&path, get(callback)).with_state(state);

        tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                redirect.completion().await;
            });
            if let Err(e) = server.await {
                error!("Loopback listener error: {}", e);
            }
            debug!("Loopback listener stopped");
        });

        info!(addr = %self.addr, path = %self.redirect_uri.path(), "Waiting for OAuth redirect");
        if let Some(on_ready) = &self.on_ready {
            on_ready(url);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use secrecy::ExposeSecret;

    use super::*;
    use crate::github::oauth::tests::{spawn_token_server, test_client_with_redirect};

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[test]
    fn test_rejects_non_loopback_redirect_uris() {
        assert!(LoopbackListener::from_redirect_uri("oneappstore://oauth-callback").is_err());
        assert!(LoopbackListener::from_redirect_uri("http://example.com:8765/cb").is_err());
        assert!(LoopbackListener::from_redirect_uri("http://127.0.0.1/cb").is_err());
        assert!(LoopbackListener::from_redirect_uri("https://127.0.0.1:8765/cb").is_err());
    }

    #[test]
    fn test_accepts_localhost() {
        let listener = LoopbackListener::from_redirect_uri("http://localhost:8765/oauth/callback")
            .unwrap();
        assert_eq!(listener.addr().port(), 8765);
        assert!(listener.addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_stray_callbacks_do_not_end_the_flow() {
        let (base, _server) = spawn_token_server().await;
        let redirect_uri = format!("http://127.0.0.1:{}/oauth/callback", free_port());
        let client = test_client_with_redirect(&base, &redirect_uri);

        let opened: Arc<Mutex<Option<Url>>> = Arc::default();
        let seen = opened.clone();
        let listener = LoopbackListener::from_redirect_uri(&redirect_uri)
            .unwrap()
            .on_ready(move |url| *seen.lock().unwrap() = Some(url.clone()));
        let run = tokio::spawn(async move { client.flow().run(&listener).await });

        let auth_url = loop {
            if let Some(url) = opened.lock().unwrap().clone() {
                break url;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        let state = auth_url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        for stray in [
            redirect_uri.clone(),
            format!("{redirect_uri}?state={state}"),
            format!("{redirect_uri}?code=forged&state=not-{state}"),
            format!("{redirect_uri}?error=access_denied"),
        ] {
            let page = reqwest::get(&stray).await.unwrap().text().await.unwrap();
            assert!(page.contains("no longer active"), "{stray}");
        }
        assert!(!run.is_finished());

        let page = reqwest::get(format!("{redirect_uri}?code=abc123&state={state}"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(page.contains("Authorization received"));
        assert_eq!(run.await.unwrap().unwrap().expose_secret(), "tok_1");
    }

    #[tokio::test]
    async fn test_browser_redirect_completes_flow() {
        let (base, _server) = spawn_token_server().await;
        let redirect_uri = format!("http://127.0.0.1:{}/oauth/callback", free_port());
        let client = test_client_with_redirect(&base, &redirect_uri);

        let opened: Arc<Mutex<Option<Url>>> = Arc::default();
        let seen = opened.clone();
        let listener = LoopbackListener::from_redirect_uri(&redirect_uri)
            .unwrap()
            .on_ready(move |url| *seen.lock().unwrap() = Some(url.clone()));

        let run = tokio::spawn(async move { client.flow().run(&listener).await });

        // Play the browser once the listener is up.
        let auth_url = loop {
            if let Some(url) = opened.lock().unwrap().clone() {
                break url;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        let state = auth_url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        let page = reqwest::get(format!("{redirect_uri}?code=abc123&state={state}"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(page.contains("Authorization received"));

        let token = run.await.unwrap().unwrap();
        assert_eq!(token.expose_secret(), "tok_1");

        // The listener shuts down once the flow is past the redirect.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(reqwest::get(&redirect_uri).await.is_err());
    }
}
