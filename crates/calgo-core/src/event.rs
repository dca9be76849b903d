//! Event types for calendar events.
//!
//! - [`EventRequest`]: what the user asked to create
//! - [`EventResult`]: what the calendar provider reports back

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::EventTime;

/// Reasons an [`EventRequest`] cannot be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EventValidationError {
    #[error("title is required")]
    MissingTitle,
    #[error("start time is required")]
    MissingStart,
    #[error("duration must be positive")]
    NonPositiveDuration,
}

/// A new event to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRequest {
    pub title: String,
    pub start: Option<DateTime<FixedOffset>>,
    pub duration: Duration,
    pub description: Option<String>,
    pub location: Option<String>,
    /// IANA zone name sent alongside the start and end timestamps.
    pub time_zone: Option<String>,
}

impl Default for EventRequest {
    fn default() -> Self {
        Self {
            title: String::new(),
            start: None,
            duration: Duration::minutes(30),
            description: None,
            location: None,
            time_zone: None,
        }
    }
}

impl EventRequest {
    pub fn new(title: impl Into<String>, start: DateTime<FixedOffset>, duration: Duration) -> Self {
        Self {
            title: title.into(),
            start: Some(start),
            duration,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = Some(time_zone.into());
        self
    }

    /// Returns `start + duration`, if a start is set.
    pub fn end(&self) -> Option<DateTime<FixedOffset>> {
        self.start
            .and_then(|start| start.checked_add_signed(self.duration))
    }

    /// Checks the request is complete, in field order.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if self.title.trim().is_empty() {
            return Err(EventValidationError::MissingTitle);
        }
        if self.start.is_none() {
            return Err(EventValidationError::MissingStart);
        }
        if self.duration <= Duration::zero() {
            return Err(EventValidationError::NonPositiveDuration);
        }
        Ok(())
    }
}

/// An event as stored by the calendar provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResult {
    pub id: String,
    pub title: String,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Link to the event in the provider's web UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
}

impl EventResult {
    pub fn duration(&self) -> Duration {
        self.end.to_utc_datetime() - self.start.to_utc_datetime()
    }
}
