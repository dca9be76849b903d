//! Client error types.

use calgo_core::{DurationError, EventValidationError, TimeError};
use calgo_providers::ProviderError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The start time could not be resolved.
    #[error(transparent)]
    Time(#[from] TimeError),

    /// The duration could not be parsed.
    #[error(transparent)]
    Duration(#[from] DurationError),

    /// The event request is incomplete.
    #[error("invalid event: {0}")]
    Event(#[from] EventValidationError),

    /// Provider error.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Output could not be rendered.
    #[error("failed to render output: {0}")]
    Output(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Output(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Output(err.to_string())
    }
}
