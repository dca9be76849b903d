//! OAuth 2.0 PKCE flow pieces for Google APIs.
//!
//! This module implements the token endpoint calls of the Authorization Code
//! flow with PKCE (Proof Key for Code Exchange) and the construction of the
//! browser authorization URL. The loopback listener lives in
//! [`super::callback`] and the orchestration in [`super::authenticator`].
//!
//! # Security
//!
//! - PKCE prevents authorization code interception attacks
//! - The state parameter is compared exactly to detect forged redirects

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

use super::config::AppCredentials;
use super::tokens::AuthorizationToken;

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Length of the random state (in bytes, before base64 encoding).
const STATE_LENGTH: usize = 16;

/// OAuth client for the token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    credentials: AppCredentials,
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Creates a new OAuth client with the given credentials.
    pub fn new(
        credentials: AppCredentials,
        timeout: Duration,
        user_agent: &str,
    ) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            credentials,
            http_client,
        })
    }

    /// Returns the application credentials.
    pub fn credentials(&self) -> &AppCredentials {
        &self.credentials
    }

    /// Builds the authorization URL for `pkce` and the given redirect.
    pub fn authorization_url(&self, pkce: &PkceFlow, redirect_uri: &str, scopes: &[String]) -> String {
        pkce.build_auth_url(
            self.credentials.auth_endpoint.as_str(),
            &self.credentials.client_id,
            redirect_uri,
            scopes,
        )
    }

    /// Exchanges an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> ProviderResult<AuthorizationToken> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .post_token(&params, "token exchange", |m| ProviderError::authentication(m))
            .await?;
        info!("obtained tokens from authorization code");
        Ok(response.into_token())
    }

    /// Obtains a new access token using the refresh token of `token`.
    ///
    /// The returned token keeps the old refresh token when the endpoint does
    /// not rotate it.
    pub async fn refresh(&self, token: &AuthorizationToken) -> ProviderResult<AuthorizationToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::token_refresh("no refresh token available"))?;

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .post_token(&params, "token refresh", |m| ProviderError::token_refresh(m))
            .await?;
        info!("refreshed access token");
        Ok(response.into_token().inherit_refresh_token(token))
    }

    /// Posts a form to the token endpoint.
    ///
    /// Transport failures and 5xx answers are `Network` errors; other
    /// non-success answers are built with `rejected`.
    async fn post_token(
        &self,
        params: &[(&str, &str)],
        purpose: &str,
        rejected: fn(String) -> ProviderError,
    ) -> ProviderResult<TokenResponse> {
        debug!(endpoint = %self.credentials.token_endpoint, "{} request", purpose);

        let response = self
            .http_client
            .post(self.credentials.token_endpoint.clone())
            .form(params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("{} request failed: {}", purpose, e)).with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e)).with_source(e)
        })?;

        if status.is_server_error() {
            return Err(ProviderError::network(format!(
                "{} failed ({}): {}",
                purpose, status, body
            )));
        }
        if !status.is_success() {
            return Err(rejected(format!("{} failed ({}): {}", purpose, status, body)));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
                .with_source(e)
        })
    }
}

/// PKCE flow state and utilities.
///
/// Implements RFC 7636 (Proof Key for Code Exchange).
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state, single use.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        let state = random_token(STATE_LENGTH);

        Self {
            verifier,
            challenge,
            state,
        }
    }

    /// Computes the SHA-256 challenge for a code verifier.
    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Returns true if `returned` is exactly the state this flow issued.
    pub fn state_matches(&self, returned: Option<&str>) -> bool {
        returned == Some(self.state.as_str())
    }

    /// Builds the authorization URL.
    pub fn build_auth_url(
        &self,
        auth_endpoint: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        let scope = scopes.join(" ");
        let separator = if auth_endpoint.contains('?') { '&' } else { '?' };

        format!(
            "{}{}client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            auth_endpoint,
            separator,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Response from the token endpoint.
#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> AuthorizationToken {
        let token = AuthorizationToken::new(
            self.access_token,
            self.refresh_token.filter(|t| !t.is_empty()),
            self.expires_in,
        );
        match self.token_type {
            Some(token_type) if !token_type.is_empty() => token.with_token_type(token_type),
            _ => token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";

    fn client_for(server: &MockServer) -> OAuthClient {
        let credentials = AppCredentials::with_endpoints(
            "test-client",
            "test-secret",
            AUTH_ENDPOINT,
            &format!("{}/token", server.uri()),
        )
        .unwrap();
        OAuthClient::new(credentials, Duration::from_secs(5), "calgo-test").unwrap()
    }

    fn expired_with_refresh() -> AuthorizationToken {
        let mut token = AuthorizationToken::new("old-access", Some("old-refresh".into()), None);
        token.expiry = Some(chrono::Utc::now() - chrono::Duration::minutes(5));
        token
    }

    #[test]
    fn pkce_verifier_length() {
        let flow = PkceFlow::new();
        // Base64 encoding of 32 bytes = 43 characters (no padding)
        assert_eq!(flow.verifier.len(), 43);
    }

    #[test]
    fn pkce_challenge_known_vector() {
        // RFC 7636 appendix B.
        let challenge = PkceFlow::compute_challenge("dBjftJeZ4CVP-mJ0kLMwhOGHcZCu2zzmKCw1Hq3pWxs");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn pkce_state_is_random() {
        let flow1 = PkceFlow::new();
        let flow2 = PkceFlow::new();
        assert_ne!(flow1.state, flow2.state);
        assert_ne!(flow1.challenge, flow2.challenge);
    }

    #[test]
    fn state_must_match_exactly() {
        let flow = PkceFlow::new();
        assert!(flow.state_matches(Some(&flow.state)));
        assert!(!flow.state_matches(None));
        assert!(!flow.state_matches(Some("")));
        assert!(!flow.state_matches(Some("state-token")));
    }

    #[test]
    fn auth_url_format() {
        let flow = PkceFlow::new();
        let url = flow.build_auth_url(
            AUTH_ENDPOINT,
            "test-client.apps.googleusercontent.com",
            "http://localhost:8080",
            &["https://www.googleapis.com/auth/calendar.events".to_string()],
        );

        let parsed = url::Url::parse(&url).unwrap();
        let params: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert!(url.starts_with(AUTH_ENDPOINT));
        assert_eq!(params["client_id"], "test-client.apps.googleusercontent.com");
        assert_eq!(params["redirect_uri"], "http://localhost:8080");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "https://www.googleapis.com/auth/calendar.events");
        assert_eq!(params["code_challenge"], flow.challenge);
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["state"], flow.state);
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["prompt"], "consent");
    }

    #[tokio::test]
    async fn exchange_code_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("code_verifier=the-verifier"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server)
            .exchange_code("the-code", "the-verifier", "http://localhost:1234")
            .await
            .unwrap();
        assert_eq!(token.access_token, "new-access");
        assert_eq!(token.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(token.token_type, "Bearer");
        assert!(token.is_valid());
    }

    #[tokio::test]
    async fn exchange_code_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .exchange_code("bad", "v", "http://localhost:1")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert!(err.message().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn refresh_keeps_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-access",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server)
            .refresh(&expired_with_refresh())
            .await
            .unwrap();
        assert_eq!(token.access_token, "fresh-access");
        assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));
        assert!(token.is_valid());
    }

    #[tokio::test]
    async fn refresh_error_classification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("revoked"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.refresh(&expired_with_refresh()).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::Network);
        assert!(err.is_retryable());

        let err = client.refresh(&expired_with_refresh()).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::TokenRefreshFailed);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn refresh_without_refresh_token() {
        let server = MockServer::start().await;
        let token = AuthorizationToken::new("a", None, None);
        let err = client_for(&server).refresh(&token).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::TokenRefreshFailed);
    }

    #[tokio::test]
    async fn malformed_token_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .refresh(&expired_with_refresh())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
    }
}
