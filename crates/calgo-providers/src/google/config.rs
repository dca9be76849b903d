//! Google Calendar provider configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{ProviderError, ProviderResult};

/// Google's OAuth authorization endpoint.
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google's OAuth token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Base URL of the Calendar v3 REST API.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Redirect used when the descriptor lists no loopback redirect.
pub const DEFAULT_REDIRECT: &str = "http://localhost";

/// OAuth application credentials, loaded from the descriptor file that
/// Google Cloud Console issues for an OAuth client.
#[derive(Clone)]
pub struct AppCredentials {
    /// The OAuth 2.0 client ID.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
    /// Authorization endpoint the browser is sent to.
    pub auth_endpoint: Url,
    /// Token endpoint for code exchange and refresh.
    pub token_endpoint: Url,
    /// Loopback redirect; the listener's port is filled in per flow.
    pub redirect_template: Url,
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("auth_endpoint", &self.auth_endpoint.as_str())
            .field("token_endpoint", &self.token_endpoint.as_str())
            .field("redirect_template", &self.redirect_template.as_str())
            .finish()
    }
}

/// Structure of Google's OAuth credentials JSON file.
///
/// Supports multiple formats:
/// 1. Google Cloud Console format with "installed" or "web" section
/// 2. Flat format with client_id and client_secret at root level (e.g., from gcloud)
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl AppCredentials {
    /// Creates credentials using Google's default endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> ProviderResult<Self> {
        Self::with_endpoints(client_id, client_secret, GOOGLE_AUTH_URI, GOOGLE_TOKEN_URI)
    }

    /// Creates credentials with explicit endpoints.
    pub fn with_endpoints(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        auth_endpoint: &str,
        token_endpoint: &str,
    ) -> ProviderResult<Self> {
        let creds = Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_endpoint: parse_endpoint("auth_uri", auth_endpoint)?,
            token_endpoint: parse_endpoint("token_uri", token_endpoint)?,
            redirect_template: parse_endpoint("redirect_uri", DEFAULT_REDIRECT)?,
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Replaces the redirect template.
    pub fn with_redirect_template(mut self, template: &str) -> ProviderResult<Self> {
        self.redirect_template = parse_endpoint("redirect_uri", template)?;
        Ok(self)
    }

    /// Loads credentials from a descriptor file.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::invalid_credentials(format!(
                "failed to read credentials file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses credentials from a descriptor JSON string.
    ///
    /// Supports multiple formats:
    /// 1. Google Cloud Console format: `{"installed": {"client_id": "...", "client_secret": "..."}}`
    /// 2. Flat format: `{"client_id": "...", "client_secret": "..."}`
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: CredentialsFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::invalid_credentials(format!("failed to parse credentials JSON: {}", e))
        })?;

        if let Some(nested) = file.installed.or(file.web) {
            let creds = Self::with_endpoints(
                nested.client_id,
                nested.client_secret,
                nested.auth_uri.as_deref().unwrap_or(GOOGLE_AUTH_URI),
                nested.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URI),
            )?;
            return match loopback_redirect(&nested.redirect_uris) {
                Some(template) => creds.with_redirect_template(template),
                None => Ok(creds),
            };
        }

        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Self::new(client_id, client_secret);
        }

        Err(ProviderError::invalid_credentials(
            "credentials file must contain 'installed'/'web' section or 'client_id'/'client_secret' at root level",
        ))
    }

    /// Checks that the id and secret are present.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(ProviderError::invalid_credentials("client_id is required"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ProviderError::invalid_credentials(
                "client_secret is required",
            ));
        }
        Ok(())
    }

    /// Returns the redirect URI for a listener bound to `port`.
    pub fn redirect_uri(&self, port: u16) -> ProviderResult<String> {
        let mut url = self.redirect_template.clone();
        url.set_port(Some(port)).map_err(|()| {
            ProviderError::invalid_credentials(format!(
                "redirect URI {} cannot carry a port",
                self.redirect_template
            ))
        })?;
        let mut uri = url.to_string();
        // `Url` always renders an empty path as "/"; keep the template's form.
        if url.path() == "/" && uri.ends_with('/') && url.query().is_none() {
            uri.pop();
        }
        Ok(uri)
    }
}

fn parse_endpoint(field: &str, value: &str) -> ProviderResult<Url> {
    Url::parse(value).map_err(|e| {
        ProviderError::invalid_credentials(format!("invalid {field} '{value}': {e}")).with_source(e)
    })
}

/// Picks the first loopback redirect from a descriptor's list.
fn loopback_redirect(uris: &[String]) -> Option<&str> {
    uris.iter()
        .map(String::as_str)
        .find(|uri| uri.starts_with("http://localhost") || uri.starts_with("http://127.0.0.1"))
}

/// Configuration for the Google Calendar provider.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Path to the OAuth client descriptor.
    pub credentials_path: PathBuf,

    /// Path of the persisted authorization token.
    pub token_path: PathBuf,

    /// Calendar that events are created in.
    pub calendar_id: String,

    /// Calendar API base URL.
    pub api_base: String,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// Maximum time to wait for the browser redirect.
    pub callback_timeout: Duration,

    /// User agent string for API requests.
    pub user_agent: String,

    /// OAuth scopes to request.
    pub scopes: Vec<String>,
}

impl GoogleConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Default wait for the authorization redirect, in seconds.
    pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

    /// Scope allowing events to be created.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.events";

    /// Creates a configuration for the given descriptor and token paths.
    pub fn new(credentials_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            token_path: token_path.into(),
            calendar_id: "primary".to_string(),
            api_base: CALENDAR_API_BASE.to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            callback_timeout: Duration::from_secs(Self::DEFAULT_CALLBACK_TIMEOUT_SECS),
            user_agent: format!("calgo/{}", env!("CARGO_PKG_VERSION")),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
        }
    }

    /// Sets the calendar ID.
    pub fn with_calendar_id(mut self, id: impl Into<String>) -> Self {
        self.calendar_id = id.into();
        self
    }

    /// Sets the Calendar API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum wait for the authorization redirect.
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.calendar_id.trim().is_empty() {
            return Err("calendar_id must not be empty".to_string());
        }
        if self.scopes.is_empty() {
            return Err("at least one OAuth scope is required".to_string());
        }
        Url::parse(&self.api_base).map_err(|e| format!("invalid API base URL: {e}"))?;
        Ok(())
    }
}
