//! Rendering of command results for the terminal.

use calgo_core::{EventResult, EventTime, format_long, format_minutes};
use calgo_providers::google::TokenStatus;
use chrono::{FixedOffset, Utc};

use crate::error::ClientResult;

/// How results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text.
    #[default]
    Plain,
    /// Pretty-printed JSON.
    Json,
    /// Bare identifiers only.
    Quiet,
}

/// Renders a created event. Timed events are shown at `offset`.
pub fn render_event(event: &EventResult, offset: FixedOffset, mode: OutputMode) -> ClientResult<String> {
    match mode {
        OutputMode::Json => Ok(serde_json::to_string_pretty(event)?),
        OutputMode::Quiet => Ok(event.id.clone()),
        OutputMode::Plain => {
            let mut lines = vec![format!("Event created: {}", event.title)];
            lines.push(format!("  Start:       {}", describe_time(&event.start, offset)));
            if !event.start.is_all_day() {
                lines.push(format!("  Duration:    {}", format_minutes(event.duration())));
            }
            if let Some(location) = &event.location {
                lines.push(format!("  Location:    {}", location));
            }
            if let Some(description) = &event.description {
                lines.push(format!("  Description: {}", description));
            }
            if let Some(link) = &event.html_link {
                lines.push(format!("  Link:        {}", link));
            }
            Ok(lines.join("\n"))
        }
    }
}

fn describe_time(time: &EventTime, offset: FixedOffset) -> String {
    match time {
        EventTime::DateTime(dt) => format_long(&dt.with_timezone(&offset)),
        EventTime::AllDay(date) => format!("{} (all day)", date.format("%a, %b %-d, %Y")),
    }
}

/// Renders the stored token state.
pub fn render_status(status: &TokenStatus, mode: OutputMode) -> ClientResult<String> {
    match mode {
        OutputMode::Json => Ok(serde_json::to_string_pretty(status)?),
        OutputMode::Quiet => Ok(serde_json::to_value(status.state)?
            .as_str()
            .unwrap_or_default()
            .to_string()),
        OutputMode::Plain => {
            let mut lines = vec![
                format!("Google Calendar: {}", status.state.describe()),
                format!("  Token file: {}", status.token_path.display()),
            ];
            if let Some(expiry) = status.expiry {
                let verb = if expiry > Utc::now() { "expires" } else { "expired" };
                lines.push(format!(
                    "  Access token {}: {}",
                    verb,
                    expiry.format("%Y-%m-%d %H:%M:%S UTC")
                ));
            }
            Ok(lines.join("\n"))
        }
    }
}
