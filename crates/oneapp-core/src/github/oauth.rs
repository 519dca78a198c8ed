// SPDX-License-Identifier: Apache-2.0

//! GitHub OAuth authorization-code flow.
//!
//! The flow:
//! 1. Build the authorization URL (with a `state` nonce and a PKCE challenge)
//! 2. Hand it to a [`UserAgent`] that opens it and reports the redirect back
//!    through a one-shot [`RedirectHandle`]
//! 3. Validate the redirect and exchange the code for an access token
//!
//! The token is returned to the caller; persisting it is not this module's job.
//! Exchanges are never retried because GitHub consumes a code on first use.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Url;
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, instrument, warn};

use crate::config::{GitHubConfig, OAuthConfig};
use crate::error::{AuthError, OneAppError};

/// Characters left unescaped in query values (RFC 3986 unreserved).
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={}", utf8_percent_encode(value, QUERY_VALUE)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Builds the GitHub authorization URL.
///
/// Scopes are joined with a single space, in the given order, and every value
/// is percent-encoded (a space becomes `%20`). The result depends only on the
/// arguments.
#[must_use]
pub fn build_authorization_url(
    endpoint: &Url,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
) -> Url {
    let scope = scopes.join(" ");
    let mut url = endpoint.clone();
    url.set_query(Some(&encode_query(&[
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("scope", &scope),
    ])));
    url
}

/// One authorization attempt: the URL to open plus the secrets needed to
/// validate the redirect and redeem the code.
#[derive(Debug)]
pub struct PendingAuthorization {
    url: Url,
    state: String,
    code_verifier: SecretString,
}

impl PendingAuthorization {
    /// URL the user agent should open.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The `state` nonce the redirect must echo back.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Extracts the authorization code from a redirect.
    fn code_from(&self, redirect: Redirect) -> Result<String, AuthError> {
        let url = match redirect {
            Redirect::Cancelled => return Err(AuthError::Cancelled),
            Redirect::Code(code) => {
                let code = code.trim();
                if code.is_empty() {
                    return Err(AuthError::Unknown {
                        message: "empty authorization code".to_string(),
                    });
                }
                return Ok(code.to_string());
            }
            Redirect::Url(url) => url,
        };

        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        if param("state").as_deref() != Some(self.state.as_str()) {
            warn!("Redirect state does not match the pending authorization");
            return Err(AuthError::StateMismatch);
        }

        if let Some(error) = param("error") {
            if error == "access_denied" {
                info!("User denied the authorization request");
                return Err(AuthError::Cancelled);
            }
            let message = match param("error_description") {
                Some(description) => format!("{error}: {description}"),
                None => error,
            };
            return Err(AuthError::Unknown { message });
        }

        param("code")
            .filter(|code| !code.is_empty())
            .ok_or_else(|| AuthError::Unknown {
                message: "redirect carried no authorization code".to_string(),
            })
    }
}

fn random_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    fn error_message(&self) -> Option<String> {
        let error = self.error.as_deref()?;
        Some(match self.error_description.as_deref() {
            Some(description) => format!("{error}: {description}"),
            None => error.to_string(),
        })
    }
}

/// Client for the GitHub OAuth endpoints.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    scopes: Vec<String>,
    authorize_endpoint: Url,
    token_endpoint: Url,
    timeout: Duration,
}

impl OAuthClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `OneAppError::Config` if `oauth_base_url` is not a valid URL.
    pub fn new(
        oauth: &OAuthConfig,
        github: &GitHubConfig,
        http: reqwest::Client,
    ) -> Result<Self, OneAppError> {
        let base = github.oauth_base_url.trim_end_matches('/');
        let endpoint = |path: &str| {
            Url::parse(&format!("{base}{path}")).map_err(|e| OneAppError::Config {
                message: format!("invalid github.oauth_base_url '{base}': {e}"),
            })
        };

        Ok(Self {
            http,
            client_id: oauth.client_id.clone(),
            client_secret: oauth.client_secret.clone(),
            redirect_uri: oauth.redirect_uri.clone(),
            scopes: oauth.scopes.clone(),
            authorize_endpoint: endpoint("/login/oauth/authorize")?,
            token_endpoint: endpoint("/login/oauth/access_token")?,
            timeout: Duration::from_secs(oauth.timeout_seconds),
        })
    }

    /// Redirect URI registered for this client.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Authorization URL for the configured client, redirect URI and scopes.
    #[must_use]
    pub fn authorization_url(&self) -> Url {
        build_authorization_url(
            &self.authorize_endpoint,
            &self.client_id,
            &self.redirect_uri,
            &self.scopes,
        )
    }

    /// Starts an authorization attempt: a fresh `state` nonce and PKCE pair
    /// appended to [`authorization_url`](Self::authorization_url).
    #[must_use]
    pub fn begin(&self) -> PendingAuthorization {
        let state = random_token();
        let verifier = format!("{}{}", random_token(), random_token());
        let challenge = pkce_challenge(&verifier);

        let mut url = self.authorization_url();
        let extra = encode_query(&[
            ("state", &state),
            ("code_challenge", &challenge),
            ("code_challenge_method", "S256"),
        ]);
        let query = match url.query() {
            Some(query) => format!("{query}&{extra}"),
            None => extra,
        };
        url.set_query(Some(&query));

        PendingAuthorization {
            url,
            state,
            code_verifier: SecretString::from(verifier),
        }
    }

    /// Starts a new observable flow.
    #[must_use]
    pub fn flow(&self) -> AuthFlow<'_> {
        let (state, _) = watch::channel(AuthState::Idle);
        AuthFlow {
            client: self,
            state,
        }
    }

    /// Exchanges an authorization code for an access token.
    ///
    /// Sends exactly one request. Fails with [`AuthError::ExchangeFailed`] on a
    /// non-success status, a transport failure, an `error` field in the
    /// response, or a missing token.
    pub async fn exchange_code_for_token(&self, code: &str) -> Result<SecretString, AuthError> {
        self.exchange(code, None).await
    }

    #[instrument(skip_all, fields(endpoint = %self.token_endpoint))]
    async fn exchange(
        &self,
        code: &str,
        pending: Option<&PendingAuthorization>,
    ) -> Result<SecretString, AuthError> {
        self.ensure_configured()?;

        let body = TokenRequest {
            client_id: &self.client_id,
            client_secret: self.client_secret.expose_secret(),
            code,
            redirect_uri: pending.map(|_| self.redirect_uri.as_str()),
            code_verifier: pending.map(|p| p.code_verifier.expose_secret()),
        };

        debug!("Exchanging authorization code");
        let response = self
            .http
            .post(self.token_endpoint.clone())
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::ExchangeFailed {
                message: format!("token request failed: {e}"),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| AuthError::ExchangeFailed {
            message: format!("failed to read token response: {e}"),
        })?;
        let parsed = serde_json::from_str::<TokenResponse>(&text);

        if !status.is_success() {
            let detail = parsed
                .ok()
                .and_then(|r| r.error_message())
                .unwrap_or_else(|| text.trim().chars().take(200).collect());
            return Err(AuthError::ExchangeFailed {
                message: format!("HTTP {status}: {detail}"),
            });
        }

        let parsed = parsed.map_err(|e| AuthError::ExchangeFailed {
            message: format!("unexpected token response: {e}"),
        })?;
        if let Some(message) = parsed.error_message() {
            return Err(AuthError::ExchangeFailed { message });
        }

        match parsed.access_token {
            Some(token) if !token.is_empty() => {
                debug!(
                    token_type = parsed.token_type.as_deref().unwrap_or("unknown"),
                    scope = parsed.scope.as_deref().unwrap_or(""),
                    "Token exchange succeeded"
                );
                Ok(SecretString::from(token))
            }
            _ => Err(AuthError::ExchangeFailed {
                message: "response contained no access token".to_string(),
            }),
        }
    }

    fn ensure_configured(&self) -> Result<(), AuthError> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::NotConfigured {
                message: "oauth.client_id is empty".to_string(),
            });
        }
        if self.client_secret.expose_secret().is_empty() {
            return Err(AuthError::NotConfigured {
                message: "oauth.client_secret is empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Observable state of an [`AuthFlow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Not started.
    Idle,
    /// Waiting for the user agent to report the redirect.
    AwaitingRedirect,
    /// Redeeming the authorization code.
    ExchangingCode,
    /// A token was obtained.
    Authenticated,
    /// The flow ended without a token.
    Failed(String),
}

impl AuthState {
    /// Returns true once the flow can no longer receive a redirect.
    #[must_use]
    pub fn is_past_redirect(&self) -> bool {
        !matches!(self, AuthState::Idle | AuthState::AwaitingRedirect)
    }
}

#[derive(Debug)]
enum Redirect {
    Url(Url),
    Code(String),
    Cancelled,
}

/// One-shot channel through which a user agent reports the redirect.
///
/// Clones share the same slot; the first delivery wins and later ones are
/// ignored. Dropping every clone without delivering cancels the flow.
#[derive(Debug, Clone)]
pub struct RedirectHandle {
    slot: Arc<Mutex<Option<oneshot::Sender<Redirect>>>>,
    state: watch::Receiver<AuthState>,
    expected_state: Arc<str>,
}

impl RedirectHandle {
    fn send(&self, redirect: Redirect) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(sender) => sender.send(redirect).is_ok(),
            None => false,
        }
    }

    /// Returns true if `url` is a redirect for this flow: it carries a `code`
    /// or an `error`, and the flow's `state`.
    #[must_use]
    pub fn matches(&self, url: &Url) -> bool {
        let mut has_result = false;
        let mut state_matches = false;
        for (key, value) in url.query_pairs() {
            match &*key {
                "code" | "error" => has_result = true,
                "state" => state_matches = *value == *self.expected_state,
                _ => {}
            }
        }
        has_result && state_matches
    }

    /// Delivers the full redirect URL. Its `state` must match the flow.
    ///
    /// Returns false if a redirect was already delivered or the flow is gone.
    pub fn deliver_url(&self, url: &Url) -> bool {
        self.send(Redirect::Url(url.clone()))
    }

    /// Delivers a bare authorization code, as pasted by the user.
    ///
    /// No `state` is available to check in this case.
    pub fn deliver_code(&self, code: impl Into<String>) -> bool {
        self.send(Redirect::Code(code.into()))
    }

    /// Cancels the flow.
    pub fn cancel(&self) -> bool {
        self.send(Redirect::Cancelled)
    }

    /// Resolves once the flow has moved past the redirect wait (or is gone).
    pub async fn completion(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(AuthState::is_past_redirect).await;
    }
}

/// Opens the authorization URL and reports the redirect.
///
/// `open` should return once the URL is handed off; the redirect may be
/// delivered later through `redirect`.
#[async_trait]
pub trait UserAgent: Send + Sync {
    /// Opens `url` for the user.
    async fn open(&self, url: &Url, redirect: RedirectHandle) -> Result<(), AuthError>;
}

/// A single run of the authorization-code flow.
pub struct AuthFlow<'a> {
    client: &'a OAuthClient,
    state: watch::Sender<AuthState>,
}

impl AuthFlow<'_> {
    /// Subscribes to state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Runs the flow to completion and returns the access token.
    ///
    /// The redirect wait is bounded by `oauth.timeout_seconds`; running out of
    /// time counts as a cancellation. Dropping the returned future aborts the
    /// wait and any in-flight exchange.
    pub async fn run(self, agent: &dyn UserAgent) -> Result<SecretString, AuthError> {
        let result = self.drive(agent).await;
        match &result {
            Ok(_) => {
                self.state.send_replace(AuthState::Authenticated);
                info!("OAuth flow completed");
            }
            Err(e) => {
                self.state.send_replace(AuthState::Failed(e.to_string()));
                warn!(error = %e, "OAuth flow failed");
            }
        }
        result
    }

    async fn drive(&self, agent: &dyn UserAgent) -> Result<SecretString, AuthError> {
        self.client.ensure_configured()?;

        let pending = self.client.begin();
        let (tx, rx) = oneshot::channel();
        let handle = RedirectHandle {
            slot: Arc::new(Mutex::new(Some(tx))),
            state: self.state.subscribe(),
            expected_state: Arc::from(pending.state()),
        };

        self.state.send_replace(AuthState::AwaitingRedirect);
        debug!(url = %pending.url(), "Awaiting authorization redirect");

        let wait = async {
            agent.open(pending.url(), handle).await?;
            rx.await.map_err(|_| AuthError::Cancelled)
        };
        let redirect = match tokio::time::timeout(self.client.timeout, wait).await {
            Ok(redirect) => redirect?,
            Err(_) => {
                warn!(
                    timeout_secs = self.client.timeout.as_secs(),
                    "Timed out waiting for the authorization redirect"
                );
                return Err(AuthError::Cancelled);
            }
        };

        let code = pending.code_from(redirect)?;
        self.state.send_replace(AuthState::ExchangingCode);
        self.client.exchange(&code, Some(&pending)).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;
    use crate::testing::spawn_server;

    pub(crate) fn test_client(oauth_base: &str) -> OAuthClient {
        test_client_with_redirect(oauth_base, &OAuthConfig::default().redirect_uri)
    }

    pub(crate) fn test_client_with_redirect(oauth_base: &str, redirect_uri: &str) -> OAuthClient {
        let oauth = OAuthConfig {
            client_id: "client-1".to_string(),
            client_secret: SecretString::from("secret-1"),
            redirect_uri: redirect_uri.to_string(),
            timeout_seconds: 5,
            ..OAuthConfig::default()
        };
        let github = GitHubConfig {
            oauth_base_url: oauth_base.to_string(),
            ..GitHubConfig::default()
        };
        OAuthClient::new(&oauth, &github, reqwest::Client::new()).unwrap()
    }

    #[derive(Default)]
    pub(crate) struct TokenServer {
        used: Mutex<HashSet<String>>,
        pub(crate) requests: Mutex<Vec<Value>>,
    }

    /// Fake token endpoint: issues `tok_<n>` once per code and rejects reuse
    /// the way GitHub does (200 with an `error` field).
    pub(crate) async fn spawn_token_server() -> (String, Arc<TokenServer>) {
        async fn token(
            State(server): State<Arc<TokenServer>>,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            server.requests.lock().unwrap().push(body.clone());
            let code = body["code"].as_str().unwrap_or_default().to_string();
            let mut used = server.used.lock().unwrap();
            if !used.insert(code) {
                return Json(json!({
                    "error": "bad_verification_code",
                    "error_description": "The code passed is incorrect or expired."
                }));
            }
            Json(json!({
                "access_token": format!("tok_{}", used.len()),
                "token_type": "bearer",
                "scope": "repo,user:email"
            }))
        }

        let server = Arc::new(TokenServer::default());
        let app = Router::new()
            .route("/login/oauth/access_token", post(token))
            .with_state(server.clone());
        (spawn_server(app).await, server)
    }

    /// Agent that answers the way a browser redirect would.
    struct ScriptedAgent<F: Fn(&PendingUrl) -> Redirect + Send + Sync>(F);

    struct PendingUrl {
        state: String,
    }

    #[async_trait]
    impl<F: Fn(&PendingUrl) -> Redirect + Send + Sync> UserAgent for ScriptedAgent<F> {
        async fn open(&self, url: &Url, redirect: RedirectHandle) -> Result<(), AuthError> {
            let state = url
                .query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default();
            match (self.0)(&PendingUrl { state }) {
                Redirect::Url(u) => redirect.deliver_url(&u),
                Redirect::Code(c) => redirect.deliver_code(c),
                Redirect::Cancelled => redirect.cancel(),
            };
            Ok(())
        }
    }

    fn callback(query: &str) -> Redirect {
        Redirect::Url(Url::parse(&format!("http://127.0.0.1:8765/oauth/callback?{query}")).unwrap())
    }

    #[test]
    fn test_authorization_url_is_deterministic_and_encoded() {
        let endpoint = Url::parse("https://github.com/login/oauth/authorize").unwrap();
        let scopes = vec!["repo".to_string(), "user:email".to_string()];
        let a = build_authorization_url(&endpoint, "cid", "oneappstore://oauth-callback", &scopes);
        let b = build_authorization_url(&endpoint, "cid", "oneappstore://oauth-callback", &scopes);

        assert_eq!(a, b);
        assert_eq!(
            a.as_str(),
            "https://github.com/login/oauth/authorize?client_id=cid\
             &redirect_uri=oneappstore%3A%2F%2Foauth-callback&scope=repo%20user%3Aemail"
        );
    }

    #[test]
    fn test_scopes_round_trip_through_url() {
        let endpoint = Url::parse("https://github.com/login/oauth/authorize").unwrap();
        let scopes = vec![
            "workflow".to_string(),
            "repo".to_string(),
            "user:email".to_string(),
        ];
        let url = build_authorization_url(&endpoint, "cid", "http://localhost/cb", &scopes);

        let scope = url
            .query_pairs()
            .find(|(k, _)| k == "scope")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        let parsed: Vec<String> = scope.split(' ').map(str::to_string).collect();
        assert_eq!(parsed, scopes);
    }

    #[test]
    fn test_begin_adds_state_and_pkce_challenge() {
        let client = test_client("https://github.com");
        let pending = client.begin();
        let pairs: Vec<(String, String)> = pending
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let get = |name: &str| pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone());

        assert_eq!(get("state").as_deref(), Some(pending.state()));
        assert_eq!(get("code_challenge_method").as_deref(), Some("S256"));
        assert_eq!(
            get("code_challenge").unwrap(),
            pkce_challenge(pending.code_verifier.expose_secret())
        );
        assert_ne!(client.begin().state(), pending.state());
    }

    #[test]
    fn test_pkce_challenge_matches_rfc7636_example() {
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[tokio::test]
    async fn test_exchange_sends_credentials_and_returns_token() {
        let (base, server) = spawn_token_server().await;
        let client = test_client(&base);

        let token = client.exchange_code_for_token("abc123").await.unwrap();
        assert_eq!(token.expose_secret(), "tok_1");

        let requests = server.requests.lock().unwrap();
        assert_eq!(
            requests[0],
            json!({"client_id": "client-1", "client_secret": "secret-1", "code": "abc123"})
        );
    }

    #[tokio::test]
    async fn test_reused_code_fails_exchange() {
        let (base, _server) = spawn_token_server().await;
        let client = test_client(&base);

        client.exchange_code_for_token("abc123").await.unwrap();
        let err = client.exchange_code_for_token("abc123").await.unwrap_err();
        match err {
            AuthError::ExchangeFailed { message } => {
                assert!(message.contains("bad_verification_code"));
            }
            other => panic!("expected ExchangeFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exchange_non_success_status_fails() {
        let app = Router::new().route(
            "/login/oauth/access_token",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let client = test_client(&spawn_server(app).await);

        let err = client.exchange_code_for_token("abc123").await.unwrap_err();
        assert!(matches!(err, AuthError::ExchangeFailed { message } if message.contains("502")));
    }

    #[tokio::test]
    async fn test_exchange_without_token_fails() {
        let app = Router::new().route(
            "/login/oauth/access_token",
            post(|| async { Json(json!({"token_type": "bearer"})) }),
        );
        let client = test_client(&spawn_server(app).await);

        let err = client.exchange_code_for_token("abc123").await.unwrap_err();
        assert!(matches!(err, AuthError::ExchangeFailed { .. }));
    }

    #[tokio::test]
    async fn test_exchange_unreachable_endpoint_fails() {
        // Nothing listens on port 9 locally.
        let client = test_client("http://127.0.0.1:9");
        let err = client.exchange_code_for_token("abc123").await.unwrap_err();
        assert!(matches!(err, AuthError::ExchangeFailed { .. }));
    }

    #[tokio::test]
    async fn test_exchange_is_sent_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/login/oauth/access_token",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::SERVICE_UNAVAILABLE
                }
            }),
        );
        let client = test_client(&spawn_server(app).await);

        assert!(client.exchange_code_for_token("abc123").await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_client_id_is_not_configured() {
        let mut client = test_client("https://github.com");
        client.client_id = String::new();
        let err = client.exchange_code_for_token("abc123").await.unwrap_err();
        assert!(matches!(err, AuthError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn test_flow_reaches_authenticated() {
        let (base, server) = spawn_token_server().await;
        let client = test_client(&base);
        let flow = client.flow();
        let mut states = flow.subscribe();
        assert_eq!(*states.borrow(), AuthState::Idle);

        let agent = ScriptedAgent(|p: &PendingUrl| callback(&format!("code=abc123&state={}", p.state)));
        let token = flow.run(&agent).await.unwrap();

        assert_eq!(token.expose_secret(), "tok_1");
        assert_eq!(*states.borrow_and_update(), AuthState::Authenticated);

        let requests = server.requests.lock().unwrap();
        assert_eq!(requests[0]["redirect_uri"], client.redirect_uri());
        assert!(requests[0]["code_verifier"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_flow_state_mismatch() {
        let client = test_client("http://127.0.0.1:9");
        let flow = client.flow();
        let states = flow.subscribe();

        let agent = ScriptedAgent(|_: &PendingUrl| callback("code=abc123&state=forged"));
        let err = flow.run(&agent).await.unwrap_err();

        assert!(matches!(err, AuthError::StateMismatch));
        assert!(matches!(*states.borrow(), AuthState::Failed(_)));
    }

    #[tokio::test]
    async fn test_flow_access_denied_is_cancelled() {
        let client = test_client("http://127.0.0.1:9");
        let agent = ScriptedAgent(|p: &PendingUrl| {
            callback(&format!("error=access_denied&state={}", p.state))
        });
        let err = client.flow().run(&agent).await.unwrap_err();
        assert!(matches!(err, AuthError::Cancelled));
    }

    #[tokio::test]
    async fn test_flow_other_provider_error_is_unknown() {
        let client = test_client("http://127.0.0.1:9");
        let agent = ScriptedAgent(|p: &PendingUrl| {
            callback(&format!(
                "error=redirect_uri_mismatch&error_description=bad+uri&state={}",
                p.state
            ))
        });
        let err = client.flow().run(&agent).await.unwrap_err();
        assert!(
            matches!(err, AuthError::Unknown { message } if message == "redirect_uri_mismatch: bad uri")
        );
    }

    #[tokio::test]
    async fn test_flow_explicit_cancel() {
        let client = test_client("http://127.0.0.1:9");
        let agent = ScriptedAgent(|_: &PendingUrl| Redirect::Cancelled);
        let err = client.flow().run(&agent).await.unwrap_err();
        assert!(matches!(err, AuthError::Cancelled));
    }

    #[tokio::test]
    async fn test_flow_dropped_handle_is_cancelled() {
        struct DropAgent;

        #[async_trait]
        impl UserAgent for DropAgent {
            async fn open(&self, _url: &Url, _redirect: RedirectHandle) -> Result<(), AuthError> {
                Ok(())
            }
        }

        let client = test_client("http://127.0.0.1:9");
        let err = client.flow().run(&DropAgent).await.unwrap_err();
        assert!(matches!(err, AuthError::Cancelled));
    }

    #[tokio::test]
    async fn test_flow_times_out() {
        #[derive(Default)]
        struct SilentAgent(Mutex<Option<RedirectHandle>>);

        #[async_trait]
        impl UserAgent for SilentAgent {
            async fn open(&self, _url: &Url, redirect: RedirectHandle) -> Result<(), AuthError> {
                *self.0.lock().unwrap() = Some(redirect);
                Ok(())
            }
        }

        let mut client = test_client("http://127.0.0.1:9");
        client.timeout = Duration::from_millis(50);
        let agent = SilentAgent::default();
        let err = client.flow().run(&agent).await.unwrap_err();
        assert!(matches!(err, AuthError::Cancelled));

        // The flow is gone; late deliveries are ignored.
        let handle = agent.0.lock().unwrap().take().unwrap();
        assert!(!handle.deliver_code("late"));
        handle.completion().await;
    }

    #[tokio::test]
    async fn test_pasted_code_skips_state_check() {
        let (base, _server) = spawn_token_server().await;
        let client = test_client(&base);
        let agent = ScriptedAgent(|_: &PendingUrl| Redirect::Code(" abc123 \n".to_string()));
        let token = client.flow().run(&agent).await.unwrap();
        assert_eq!(token.expose_secret(), "tok_1");
    }
}
