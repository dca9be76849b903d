//! Token acquisition for the Calendar API.
//!
//! The [`Authenticator`] hands out a usable access token, preferring in
//! order: the persisted token while it is still valid, a refreshed token,
//! and finally the interactive browser flow over a loopback redirect.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};

use super::callback::{CallbackListener, CallbackOutcome};
use super::client::CalendarClient;
use super::config::{AppCredentials, GoogleConfig};
use super::oauth::{OAuthClient, PkceFlow};
use super::tokens::{AuthorizationToken, TokenStore};

/// Pause before the single retry of a refresh that failed transiently.
const REFRESH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Opens the authorization URL for the user.
pub trait BrowserLauncher: Send + Sync {
    /// Opens `url`. Failures are reported but never fatal.
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Opens URLs with the platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        open::that(url)
    }
}

/// Condition of the persisted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    /// No token file.
    Missing,
    /// The token file exists but cannot be read.
    Unreadable,
    /// The access token is usable.
    Valid,
    /// The access token expired but can be refreshed.
    Refreshable,
    /// The access token expired and there is no refresh token.
    Expired,
}

impl TokenState {
    /// Human-readable description.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Missing => "not authenticated",
            Self::Unreadable => "token file is unreadable",
            Self::Valid => "authenticated",
            Self::Refreshable => "access token expired, will refresh on next use",
            Self::Expired => "token expired, re-authentication required",
        }
    }
}

/// Snapshot of the persisted token, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct TokenStatus {
    pub state: TokenState,
    pub token_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

/// Obtains access tokens and authenticated clients.
pub struct Authenticator {
    config: GoogleConfig,
    store: TokenStore,
    credentials: OnceCell<AppCredentials>,
    browser: Arc<dyn BrowserLauncher>,
    refresh_retry_delay: Duration,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Creates an authenticator. Credentials are read once from
    /// `config.credentials_path`, on first use.
    pub fn new(config: GoogleConfig) -> Self {
        let store = TokenStore::new(&config.token_path);
        Self {
            config,
            store,
            credentials: OnceCell::new(),
            browser: Arc::new(SystemBrowser),
            refresh_retry_delay: REFRESH_RETRY_DELAY,
        }
    }

    /// Uses already loaded credentials instead of the credentials file.
    pub fn with_credentials(mut self, credentials: AppCredentials) -> Self {
        self.credentials = OnceCell::from(credentials);
        self
    }

    /// Replaces the browser launcher.
    pub fn with_browser(mut self, browser: impl BrowserLauncher + 'static) -> Self {
        self.browser = Arc::new(browser);
        self
    }

    /// Sets the pause before retrying a transiently failed refresh.
    pub fn with_refresh_retry_delay(mut self, delay: Duration) -> Self {
        self.refresh_retry_delay = delay;
        self
    }

    /// Returns the provider configuration.
    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    /// Returns the token file path.
    pub fn token_path(&self) -> &Path {
        self.store.path()
    }

    /// Returns a usable access token.
    ///
    /// Only the interactive flow observes `cancel`.
    pub async fn get_token(&self, cancel: &CancellationToken) -> ProviderResult<AuthorizationToken> {
        let oauth = self.oauth_client().await?;

        match self.store.load() {
            Ok(Some(token)) if token.is_valid() => {
                debug!("using stored access token");
                return Ok(token);
            }
            Ok(Some(token)) if token.can_refresh() => {
                match self.refresh_with_retry(&oauth, &token).await {
                    Ok(fresh) => {
                        self.persist(&fresh);
                        return Ok(fresh);
                    }
                    Err(e) => info!("token refresh failed, starting authorization: {}", e),
                }
            }
            Ok(Some(_)) => debug!("stored token expired and cannot be refreshed"),
            Ok(None) => debug!("no stored token"),
            Err(e) => warn!("ignoring stored token: {}", e),
        }

        self.authorize(&oauth, cancel).await
    }

    /// Runs the browser flow even if a usable token is stored.
    ///
    /// The stored token is only replaced once the new one is obtained.
    pub async fn reauthorize(&self, cancel: &CancellationToken) -> ProviderResult<AuthorizationToken> {
        let oauth = self.oauth_client().await?;
        self.authorize(&oauth, cancel).await
    }

    /// Returns a Calendar API client with a usable access token.
    pub async fn get_client(&self, cancel: &CancellationToken) -> ProviderResult<CalendarClient> {
        let token = self.get_token(cancel).await?;
        CalendarClient::new(token.access_token, &self.config)
    }

    /// Removes the persisted token.
    pub fn clear_token(&self) -> ProviderResult<()> {
        self.store.clear()
    }

    /// Returns true if a token file exists.
    pub fn has_saved_token(&self) -> bool {
        self.store.exists()
    }

    /// Reports the state of the persisted token without any network call.
    pub fn status(&self) -> TokenStatus {
        let (state, expiry) = match self.store.load() {
            Ok(None) => (TokenState::Missing, None),
            Err(_) => (TokenState::Unreadable, None),
            Ok(Some(token)) => {
                let state = if token.is_valid() {
                    TokenState::Valid
                } else if token.can_refresh() {
                    TokenState::Refreshable
                } else {
                    TokenState::Expired
                };
                (state, token.expiry)
            }
        };
        TokenStatus {
            state,
            token_path: self.store.path().to_path_buf(),
            expiry,
        }
    }

    async fn oauth_client(&self) -> ProviderResult<OAuthClient> {
        let credentials = self
            .credentials
            .get_or_try_init(|| async { AppCredentials::from_file(&self.config.credentials_path) })
            .await?;
        OAuthClient::new(credentials.clone(), self.config.timeout, &self.config.user_agent)
    }

    async fn refresh_with_retry(
        &self,
        oauth: &OAuthClient,
        token: &AuthorizationToken,
    ) -> ProviderResult<AuthorizationToken> {
        match oauth.refresh(token).await {
            Err(e) if e.is_retryable() => {
                debug!("retrying token refresh after: {}", e);
                tokio::time::sleep(self.refresh_retry_delay).await;
                oauth.refresh(token).await
            }
            result => result,
        }
    }

    fn persist(&self, token: &AuthorizationToken) {
        if let Err(e) = self.store.save(token) {
            warn!("failed to save token: {}", e);
        }
    }

    /// Runs the browser flow and persists the resulting token.
    async fn authorize(
        &self,
        oauth: &OAuthClient,
        cancel: &CancellationToken,
    ) -> ProviderResult<AuthorizationToken> {
        let (listener, completion) = CallbackListener::start().await?;
        let result = self.await_authorization(oauth, &listener, completion, cancel).await;
        listener.close().await;

        let token = result?;
        self.persist(&token);
        info!("authorization complete");
        Ok(token)
    }

    async fn await_authorization(
        &self,
        oauth: &OAuthClient,
        listener: &CallbackListener,
        completion: tokio::sync::oneshot::Receiver<CallbackOutcome>,
        cancel: &CancellationToken,
    ) -> ProviderResult<AuthorizationToken> {
        let redirect_uri = oauth.credentials().redirect_uri(listener.port())?;
        let pkce = PkceFlow::new();
        let auth_url = oauth.authorization_url(&pkce, &redirect_uri, &self.config.scopes);

        eprintln!("\nOpen this URL in your browser to authorize calgo:\n\n{}\n", auth_url);
        if let Err(e) = self.browser.open(&auth_url) {
            warn!("failed to open browser: {}", e);
        }

        let outcome = tokio::select! {
            outcome = completion => outcome.map_err(|_| {
                ProviderError::authentication("callback listener stopped unexpectedly")
            })?,
            _ = cancel.cancelled() => {
                return Err(ProviderError::cancelled("authorization cancelled"));
            }
            _ = tokio::time::sleep(self.config.callback_timeout) => {
                return Err(ProviderError::authentication("timeout waiting for authorization"));
            }
        };

        let (code, state) = match outcome {
            CallbackOutcome::Code { code, state } => (code, state),
            CallbackOutcome::Error(error) => {
                return Err(ProviderError::authentication(format!(
                    "authorization failed: {}",
                    error
                )));
            }
        };

        if !pkce.state_matches(state.as_deref()) {
            return Err(ProviderError::authentication(
                "OAuth state mismatch - possible CSRF attack",
            ));
        }

        debug!("received authorization code, exchanging for tokens");
        oauth
            .exchange_code(&code, &pkce.verifier, &redirect_uri)
            .await
            .map_err(|e| match e.code() {
                ProviderErrorCode::AuthenticationFailed => e,
                _ => ProviderError::authentication(format!("token exchange failed: {}", e.message()))
                    .with_source(e),
            })
    }
}
