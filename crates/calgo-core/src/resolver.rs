//! Resolution of user-supplied date/time text into an absolute instant.
//!
//! Input is tried against four forms in order, and the first one that
//! matches wins:
//!
//! 1. relative durations: `in 2 hours`, `in 45 mins`
//! 2. relative days: `today 14:00`, `tomorrow at 9:30`
//! 3. a bare clock time: `14:00`, `09:15:30`
//! 4. absolute dates, with or without an explicit UTC offset
//!
//! Wall-clock input is interpreted in a [`Zone`] chosen from an explicit
//! name, then the `TZ` environment variable, then the system local zone.
//!
//! # Example
//!
//! ```
//! use calgo_core::resolver::TimeResolver;
//! use chrono::{TimeZone, Utc};
//!
//! let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
//! let resolver = TimeResolver::new().at(now);
//! let start = resolver.resolve("in 2 hours", Some("UTC")).unwrap();
//! assert_eq!(start.to_rfc3339(), "2024-01-15T14:00:00+00:00");
//! ```

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::time::Zone;

/// Environment variable consulted when no explicit timezone is given.
pub const TZ_ENV: &str = "TZ";

const FORMAT_HINT: &str =
    "Try formats like '2024-01-15 14:00', '14:00', 'tomorrow 14:00', or 'in 2 hours'";

/// Regex for `in <N> <unit>` expressions.
static RELATIVE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^in\s+(\d+)\s*(hours?|hrs?|minutes?|mins?)$").expect("Invalid relative regex")
});

/// Regex for `today|tomorrow [at] H:MM[:SS]` expressions.
static DAY_TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(today|tomorrow)\s*(?:at\s+)?(\d{1,2}):(\d{2})(?::(\d{2}))?$")
        .expect("Invalid day-time regex")
});

/// Regex for a bare clock time.
static TIME_ONLY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})(?::(\d{2}))?$").expect("Invalid time regex")
});

/// Layouts carrying their own UTC offset, tried after RFC 3339.
const OFFSET_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

/// Wall-clock layouts interpreted in the resolved zone, in priority order.
/// US month/day ordering is tried before European day/month ordering.
const LOCAL_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%b %d, %Y %H:%M:%S",
    "%b %d, %Y %H:%M",
    "%B %d, %Y %H:%M:%S",
    "%B %d, %Y %H:%M",
];

/// Where an invalid timezone name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneOrigin {
    /// Passed explicitly by the caller.
    Explicit,
    /// Read from the `TZ` environment variable.
    Environment,
}

impl fmt::Display for ZoneOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => Ok(()),
            Self::Environment => write!(f, " (from {TZ_ENV} environment variable)"),
        }
    }
}

/// Errors produced while resolving date/time text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// The text matched none of the accepted forms.
    #[error("invalid date/time format: {message}")]
    InvalidFormat { input: String, message: String },

    /// The timezone name is not a known IANA zone.
    #[error("invalid timezone: {name}{origin}")]
    InvalidTimezone { name: String, origin: ZoneOrigin },
}

/// Result type for time resolution.
pub type TimeResult<T> = Result<T, TimeError>;

/// Resolves date/time text relative to "now" in a chosen zone.
///
/// The ambient `TZ` value and the current instant are held by the resolver
/// so both can be fixed in tests.
#[derive(Debug, Clone, Default)]
pub struct TimeResolver {
    ambient_tz: Option<String>,
    now: Option<DateTime<Utc>>,
}

impl TimeResolver {
    /// Creates a resolver with no ambient timezone and the real clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver reading the ambient timezone from `TZ`.
    pub fn from_env() -> Self {
        Self {
            ambient_tz: std::env::var(TZ_ENV).ok(),
            now: None,
        }
    }

    /// Sets the ambient timezone value, as if read from `TZ`.
    #[must_use]
    pub fn with_ambient_tz(mut self, tz: impl Into<String>) -> Self {
        self.ambient_tz = Some(tz.into());
        self
    }

    /// Pins "now" to a fixed instant.
    #[must_use]
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// Picks the zone for wall-clock input.
    ///
    /// A present but unknown name is an error; it never falls through to the
    /// next source.
    pub fn zone(&self, explicit: Option<&str>) -> TimeResult<Zone> {
        if let Some(name) = non_blank(explicit) {
            return Zone::from_name(name).ok_or_else(|| TimeError::InvalidTimezone {
                name: name.to_string(),
                origin: ZoneOrigin::Explicit,
            });
        }
        if let Some(name) = non_blank(self.ambient_tz.as_deref()) {
            return Zone::from_name(name).ok_or_else(|| TimeError::InvalidTimezone {
                name: name.to_string(),
                origin: ZoneOrigin::Environment,
            });
        }
        Ok(Zone::Local)
    }

    /// Resolves `input` to an absolute instant.
    ///
    /// The returned value carries the offset of the zone it was interpreted
    /// in, or the offset written in the input when there was one.
    pub fn resolve(&self, input: &str, timezone: Option<&str>) -> TimeResult<DateTime<FixedOffset>> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TimeError::InvalidFormat {
                input: String::new(),
                message: "empty input".to_string(),
            });
        }

        let zone = self.zone(timezone)?;
        let now = self.now();
        let lowered = input.to_lowercase();

        let resolved = relative_duration(&lowered, zone, now)
            .map(|dt| ("relative", dt))
            .or_else(|| relative_day(&lowered, zone, now).map(|dt| ("day", dt)))
            .or_else(|| time_only(&lowered, zone, now).map(|dt| ("time", dt)))
            .or_else(|| general(input, zone).map(|dt| ("absolute", dt)));

        match resolved {
            Some((form, dt)) => {
                debug!(input, %zone, form, resolved = %dt.to_rfc3339(), "resolved time");
                Ok(dt)
            }
            None => Err(TimeError::InvalidFormat {
                input: input.to_string(),
                message: format!("could not parse '{input}'. {FORMAT_HINT}"),
            }),
        }
    }
}

/// Resolves `input` using the process environment and the real clock.
pub fn parse_time(input: &str, timezone: Option<&str>) -> TimeResult<DateTime<FixedOffset>> {
    TimeResolver::from_env().resolve(input, timezone)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn relative_duration(input: &str, zone: Zone, now: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
    let caps = RELATIVE_REGEX.captures(input)?;
    let amount: i64 = caps[1].parse().ok()?;
    let span = if caps[2].starts_with('h') {
        Duration::try_hours(amount)?
    } else {
        Duration::try_minutes(amount)?
    };
    Some(zone.to_fixed(now.checked_add_signed(span)?))
}

fn relative_day(input: &str, zone: Zone, now: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
    let caps = DAY_TIME_REGEX.captures(input)?;
    let time = clock_time(&caps[2], &caps[3], caps.get(4).map(|m| m.as_str()))?;
    let today = zone.date_of(now);
    let date = if &caps[1] == "tomorrow" {
        today.succ_opt()?
    } else {
        today
    };
    zone.localize(date.and_time(time))
}

fn time_only(input: &str, zone: Zone, now: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
    let caps = TIME_ONLY_REGEX.captures(input)?;
    let time = clock_time(&caps[1], &caps[2], caps.get(3).map(|m| m.as_str()))?;
    zone.localize(zone.date_of(now).and_time(time))
}

/// Builds a 24h clock time, rejecting out-of-range components.
fn clock_time(hour: &str, minute: &str, second: Option<&str>) -> Option<NaiveTime> {
    let hour = hour.parse().ok()?;
    let minute = minute.parse().ok()?;
    let second = match second {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    NaiveTime::from_hms_opt(hour, minute, second)
}

fn general(input: &str, zone: Zone) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt);
    }
    if let Some(dt) = OFFSET_LAYOUTS
        .iter()
        .find_map(|layout| DateTime::parse_from_str(input, layout).ok())
    {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt);
    }
    if let Some(naive) = LOCAL_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(input, layout).ok())
    {
        return zone.localize(naive);
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| zone.localize(date.and_time(NaiveTime::MIN)))
}
