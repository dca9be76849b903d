//! OAuth token storage.
//!
//! The authorization token lives in a single JSON file readable only by its
//! owner. Writes go through a temporary file that is renamed over the target.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// A persisted OAuth token set.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationToken {
    /// The access token for API requests.
    pub access_token: String,

    /// Token type, normally `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// The refresh token for obtaining new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// When the access token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl AuthorizationToken {
    /// Creates a token from token endpoint response data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            refresh_token,
            expiry: expires_in_secs.and_then(|secs| {
                Duration::try_seconds(secs).and_then(|d| Utc::now().checked_add_signed(d))
            }),
        }
    }

    /// Sets the token type.
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// Returns true if the access token is usable at `now`.
    ///
    /// A token without an expiry is never valid.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && self.expiry.is_some_and(|expiry| expiry > now)
    }

    /// Returns true if the access token is usable right now.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Returns true if a non-empty refresh token is present.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Keeps `previous`'s refresh token when this one has none.
    #[must_use]
    pub fn inherit_refresh_token(mut self, previous: &AuthorizationToken) -> Self {
        if !self.can_refresh() {
            self.refresh_token = previous.refresh_token.clone();
        }
        self
    }

    /// Returns the time until the token expires, if known.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expiry.map(|expiry| expiry - Utc::now())
    }
}

impl fmt::Debug for AuthorizationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationToken")
            .field("access_token", &"[redacted]")
            .field("token_type", &self.token_type)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[redacted]"),
            )
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// File-backed token persistence.
#[derive(Debug, Clone)]
pub struct TokenStore {
    /// Path to the token file.
    path: PathBuf,
}

impl TokenStore {
    /// Creates a store at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the token, or `None` when no file exists.
    pub fn load(&self) -> ProviderResult<Option<AuthorizationToken>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no token file at {:?}", self.path);
                return Ok(None);
            }
            Err(e) => {
                return Err(
                    ProviderError::storage(format!("failed to read token file: {}", e))
                        .with_source(e),
                );
            }
        };

        let token: AuthorizationToken = serde_json::from_str(&content).map_err(|e| {
            ProviderError::storage(format!("failed to parse token file: {}", e)).with_source(e)
        })?;

        debug!("loaded token from {:?}", self.path);
        Ok(Some(token))
    }

    /// Writes the token, replacing any previous file.
    pub fn save(&self, token: &AuthorizationToken) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::storage(format!("failed to create token directory: {}", e))
                    .with_source(e)
            })?;
        }

        let content = serde_json::to_string_pretty(token)
            .map_err(|e| ProviderError::internal(format!("failed to serialize token: {}", e)))?;

        let temp_path = self.path.with_extension("json.tmp");
        write_private(&temp_path, content.as_bytes()).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            ProviderError::storage(format!("failed to write token file: {}", e)).with_source(e)
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            ProviderError::storage(format!("failed to rename token file: {}", e)).with_source(e)
        })?;

        debug!("saved token to {:?}", self.path);
        Ok(())
    }

    /// Returns true if a token file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Removes the token file. Succeeds if it is already gone.
    pub fn clear(&self) -> ProviderResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("cleared token at {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(
                ProviderError::storage(format!("failed to remove token file: {}", e))
                    .with_source(e),
            ),
        }
    }
}

/// Creates (or truncates) `path` with owner-only permissions and writes
/// `bytes` to it.
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // The mode only applies on creation; tighten a leftover temp file too.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthorizationToken {
        AuthorizationToken::new("access-token", Some("refresh-token".to_string()), Some(3600))
    }

    #[test]
    fn token_validity() {
        let token = sample();
        assert!(token.is_valid());
        assert!(token.can_refresh());

        let now = Utc::now();
        let mut expired = sample();
        expired.expiry = Some(now - Duration::hours(1));
        assert!(!expired.is_valid_at(now));

        let mut at_boundary = sample();
        at_boundary.expiry = Some(now);
        assert!(!at_boundary.is_valid_at(now));

        let mut no_expiry = sample();
        no_expiry.expiry = None;
        assert!(!no_expiry.is_valid());

        let mut empty = sample();
        empty.access_token.clear();
        assert!(!empty.is_valid());
    }

    #[test]
    fn inherit_refresh_token() {
        let previous = sample();
        let refreshed = AuthorizationToken::new("new-access", None, Some(3600))
            .inherit_refresh_token(&previous);
        assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-token"));

        let rotated = AuthorizationToken::new("new-access", Some("rotated".into()), Some(3600))
            .inherit_refresh_token(&previous);
        assert_eq!(rotated.refresh_token.as_deref(), Some("rotated"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("access-token"));
        assert!(!rendered.contains("refresh-token"));
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn file_format() {
        let mut token = AuthorizationToken::new("a", None, None);
        token.expiry = Some(
            DateTime::parse_from_rfc3339("2024-01-15T14:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        let json: serde_json::Value = serde_json::to_value(&token).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "access_token": "a",
                "token_type": "Bearer",
                "expiry": "2024-01-15T14:00:00Z"
            })
        );
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("nested").join("token.json"));
        assert!(!store.exists());

        let token = sample();
        store.save(&token).unwrap();
        assert!(store.exists());
        assert!(!dir.path().join("nested").join("token.json.tmp").exists());

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, token);
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&sample()).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn load_corrupt_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{not json").unwrap();
        let err = TokenStore::new(path).load().unwrap_err();
        assert_eq!(err.code(), crate::error::ProviderErrorCode::Storage);
        assert!(err.message().contains("parse"));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&sample()).unwrap();

        store.clear().unwrap();
        assert!(!store.exists());
        store.clear().unwrap();
    }
}
