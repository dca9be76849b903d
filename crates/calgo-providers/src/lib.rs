//! Calendar backends for calgo.
//!
//! - [`ProviderError`] - Error type shared by every backend operation
//! - [`ApiError`] - Calendar API failures before classification
//! - [`google`] - OAuth authorization, token storage and event submission
//!   for Google Calendar

pub mod error;
#[cfg(feature = "google")]
pub mod google;

pub use error::{ApiError, ApiErrorItem, ProviderError, ProviderErrorCode, ProviderResult};
