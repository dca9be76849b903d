//! Google Calendar API client.
//!
//! Submits new events to the Calendar v3 API and converts the responses,
//! successful or not, into typed results.

use calgo_core::{EventRequest, EventResult, EventTime};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ApiError, ProviderError, ProviderResult};

use super::config::GoogleConfig;

const PROVIDER_NAME: &str = "google";

/// Authenticated Google Calendar API client.
#[derive(Debug, Clone)]
pub struct CalendarClient {
    http_client: reqwest::Client,
    access_token: String,
    api_base: String,
    calendar_id: String,
}

impl CalendarClient {
    /// Creates a client for the calendar named in `config`.
    pub fn new(access_token: impl Into<String>, config: &GoogleConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            http_client,
            access_token: access_token.into(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            calendar_id: config.calendar_id.clone(),
        })
    }

    /// Targets a different calendar.
    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    /// Returns the target calendar ID.
    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    /// Creates an event.
    ///
    /// The request is validated before anything is sent.
    pub async fn create_event(&self, request: &EventRequest) -> ProviderResult<EventResult> {
        request
            .validate()
            .map_err(|e| ProviderError::invalid_event_time(e.to_string()))?;
        let body = ApiEventInsert::from_request(request)?;

        let url = format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(&self.calendar_id)
        );
        debug!(calendar = %self.calendar_id, summary = %body.summary, "creating event");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| api_failure(ApiError::Transport(e.to_string())))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| api_failure(ApiError::Transport(e.to_string())))?;

        if !status.is_success() {
            debug!(%status, "event creation rejected");
            return Err(api_failure(ApiError::from_response(status.as_u16(), &text)));
        }

        let event: ApiEvent = serde_json::from_str(&text).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse response: {}", e))
                .with_provider(PROVIDER_NAME)
                .with_source(e)
        })?;
        let result = event.into_result()?;
        info!(id = %result.id, "created event");
        Ok(result)
    }
}

fn api_failure(err: ApiError) -> ProviderError {
    ProviderError::from(err).with_provider(PROVIDER_NAME)
}

/// Body of an events.insert request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventInsert {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    start: ApiEventTimeOut,
    end: ApiEventTimeOut,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTimeOut {
    date_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

impl ApiEventInsert {
    fn from_request(request: &EventRequest) -> ProviderResult<Self> {
        let (Some(start), Some(end)) = (request.start, request.end()) else {
            return Err(ProviderError::invalid_event_time("start time is required"));
        };
        let time_zone = request
            .time_zone
            .as_deref()
            .map(str::trim)
            .filter(|tz| !tz.is_empty())
            .map(String::from);

        Ok(Self {
            summary: request.title.trim().to_string(),
            description: request.description.clone().filter(|d| !d.is_empty()),
            location: request.location.clone().filter(|l| !l.is_empty()),
            start: ApiEventTimeOut {
                date_time: start.to_rfc3339(),
                time_zone: time_zone.clone(),
            },
            end: ApiEventTimeOut {
                date_time: end.to_rfc3339(),
                time_zone,
            },
        })
    }
}

/// An event as returned by the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: ApiEventTime,
    end: ApiEventTime,
    html_link: Option<String>,
}

/// Event time from the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

impl ApiEventTime {
    fn parse(&self, which: &str) -> ProviderResult<EventTime> {
        match (&self.date_time, &self.date) {
            (Some(dt), _) => DateTime::parse_from_rfc3339(dt)
                .map(|dt| EventTime::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| {
                    ProviderError::invalid_response(format!("failed to parse {which} time: {e}"))
                }),
            (None, Some(date)) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map(EventTime::AllDay)
                .map_err(|e| {
                    ProviderError::invalid_response(format!("failed to parse {which} date: {e}"))
                }),
            (None, None) => Err(ProviderError::invalid_response(format!(
                "event has no {which} time"
            ))),
        }
    }
}

impl ApiEvent {
    fn into_result(self) -> ProviderResult<EventResult> {
        let start = self.start.parse("start")?;
        let end = self.end.parse("end")?;
        Ok(EventResult {
            id: self.id.unwrap_or_default(),
            title: self.summary.unwrap_or_default(),
            start,
            end,
            description: self.description,
            location: self.location,
            html_link: self.html_link,
        })
    }
}
