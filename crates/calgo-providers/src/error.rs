//! Error types for calendar provider operations.
//!
//! [`ProviderError`] is the single error type returned by authorization,
//! token storage and event submission. Calendar API failures first arrive as
//! an [`ApiError`] and are mapped onto a [`ProviderErrorCode`].

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// The credentials descriptor is missing or malformed.
    InvalidCredentials,
    /// The interactive authorization flow did not complete.
    AuthenticationFailed,
    /// Refreshing a stored token failed. Handled by falling back to the
    /// interactive flow.
    TokenRefreshFailed,
    /// The caller cancelled the operation.
    Cancelled,
    /// The calendar API rejected the event.
    EventCreationFailed,
    /// The event request failed local validation.
    InvalidEventTime,
    /// The target calendar does not exist (404).
    CalendarNotFound,
    /// Access was refused (401, or 403 without a quota reason).
    PermissionDenied,
    /// Rate or quota limits were hit (429, or 403 with a quota reason).
    QuotaExceeded,
    /// Transport failure talking to the token endpoint, or a 5xx from it.
    Network,
    /// A response could not be parsed.
    InvalidResponse,
    /// Reading or writing the token file failed.
    Storage,
    /// Unexpected internal state.
    Internal,
}

impl ProviderErrorCode {
    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Returns a stable snake_case identifier for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::AuthenticationFailed => "authentication_failed",
            Self::TokenRefreshFailed => "token_refresh_failed",
            Self::Cancelled => "cancelled",
            Self::EventCreationFailed => "event_creation_failed",
            Self::InvalidEventTime => "invalid_event_time",
            Self::CalendarNotFound => "calendar_not_found",
            Self::PermissionDenied => "permission_denied",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Network => "network",
            Self::InvalidResponse => "invalid_response",
            Self::Storage => "storage",
            Self::Internal => "internal",
        }
    }

    /// Returns the human-readable prefix used when displaying errors.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid credentials file format",
            Self::AuthenticationFailed => "authentication failed",
            Self::TokenRefreshFailed => "token refresh failed",
            Self::Cancelled => "operation cancelled",
            Self::EventCreationFailed => "failed to create event",
            Self::InvalidEventTime => "invalid event time",
            Self::CalendarNotFound => "calendar not found",
            Self::PermissionDenied => "permission denied",
            Self::QuotaExceeded => "API quota exceeded",
            Self::Network => "network error",
            Self::InvalidResponse => "invalid response",
            Self::Storage => "token storage error",
            Self::Internal => "internal error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while interacting with a calendar provider.
#[derive(Debug, Error)]
pub struct ProviderError {
    /// The error code categorizing this error.
    code: ProviderErrorCode,
    /// A human-readable message describing the error.
    message: String,
    /// The provider that generated this error (e.g., "google").
    provider: Option<String>,
    /// The underlying cause of this error, if any.
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidCredentials, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    pub fn token_refresh(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::TokenRefreshFailed, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Cancelled, message)
    }

    pub fn event_creation(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::EventCreationFailed, message)
    }

    pub fn invalid_event_time(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidEventTime, message)
    }

    pub fn calendar_not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::CalendarNotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::PermissionDenied, message)
    }

    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::QuotaExceeded, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Network, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Storage, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Internal, message)
    }

    /// Sets the provider name for this error.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the provider name, if set.
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}: {}", self.code.label(), self.message)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Reasons the calendar API uses for quota and rate limiting on 403.
const QUOTA_REASONS: &[&str] = &["quotaExceeded", "rateLimitExceeded", "userRateLimitExceeded"];

/// One entry of the `errors` array in a calendar API error body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiErrorItem {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub domain: String,
}

/// A failed calendar API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The server answered with an error status.
    Structured {
        status: u16,
        message: String,
        errors: Vec<ApiErrorItem>,
    },
    /// The request never produced an HTTP response.
    Transport(String),
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

impl ApiError {
    /// Builds a structured error from a status code and raw response body.
    ///
    /// Bodies that are not the standard JSON error envelope keep the raw
    /// text as the message.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ApiErrorEnvelope>(body) {
            Ok(envelope) => Self::Structured {
                status,
                message: envelope.error.message,
                errors: envelope.error.errors,
            },
            Err(_) => Self::Structured {
                status,
                message: body.trim().to_string(),
                errors: Vec::new(),
            },
        }
    }

    fn has_quota_reason(errors: &[ApiErrorItem]) -> bool {
        errors
            .iter()
            .any(|item| QUOTA_REASONS.contains(&item.reason.as_str()))
    }
}

impl From<ApiError> for ProviderError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Transport(message) => ProviderError::event_creation(message),
            ApiError::Structured {
                status,
                message,
                errors,
            } => match status {
                400 => ProviderError::event_creation(format!("invalid request - {message}")),
                401 => {
                    ProviderError::permission_denied("authentication expired, please re-authenticate")
                }
                403 if ApiError::has_quota_reason(&errors) => {
                    ProviderError::quota_exceeded("please try again later")
                }
                403 => ProviderError::permission_denied(
                    "you don't have permission to access this calendar",
                ),
                404 => ProviderError::calendar_not_found("check that the calendar ID is correct"),
                429 => ProviderError::quota_exceeded("too many requests, please try again later"),
                _ => ProviderError::event_creation(format!("{message} (code: {status})")),
            },
        }
    }
}
