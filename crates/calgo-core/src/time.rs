//! Time types for calendar events.
//!
//! This module provides [`EventTime`] for representing event start/end times
//! as returned by a calendar provider (either a specific datetime or an
//! all-day date), and [`Zone`] for the timezone user input is interpreted in.

use std::cmp::Ordering;
use std::fmt;

use chrono::{
    DateTime, Duration, FixedOffset, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Represents the time of a calendar event.
///
/// Calendar events can have two types of times:
/// - **DateTime**: A specific point in time (with timezone, stored as UTC)
/// - **AllDay**: A date without a specific time (all-day events)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific datetime, stored in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day event date (no specific time).
    AllDay(NaiveDate),
}

impl EventTime {
    /// Creates a new `EventTime::DateTime` from a datetime in any timezone.
    pub fn from_instant<Tz2: TimeZone>(dt: DateTime<Tz2>) -> Self {
        Self::DateTime(dt.with_timezone(&Utc))
    }

    /// Creates a new `EventTime::AllDay` from a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    /// Returns `true` if this is an all-day event time.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Returns the datetime if this is a `DateTime` variant.
    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            Self::AllDay(_) => None,
        }
    }

    /// Converts to a UTC datetime.
    ///
    /// For all-day events, returns midnight UTC on that date.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => date.and_time(chrono::NaiveTime::MIN).and_utc(),
        }
    }

    /// Returns the date portion of this event time.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::DateTime(dt) => dt.date_naive(),
            Self::AllDay(date) => *date,
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc_datetime().cmp(&other.to_utc_datetime())
    }
}

/// The timezone used to interpret wall-clock input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// A named IANA zone such as `Europe/Paris`.
    Named(Tz),
    /// The operating system's local zone.
    Local,
}

impl Zone {
    /// Looks up an IANA zone by name.
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse::<Tz>().ok().map(Self::Named)
    }

    /// Returns the IANA name, or `None` for the system local zone.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Self::Named(tz) => Some(tz.name()),
            Self::Local => None,
        }
    }

    /// Converts a UTC instant to this zone's offset.
    pub fn to_fixed(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Self::Named(tz) => instant.with_timezone(tz).fixed_offset(),
            Self::Local => instant.with_timezone(&Local).fixed_offset(),
        }
    }

    /// Returns the local date of `instant` in this zone.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.to_fixed(instant).date_naive()
    }

    /// Attaches this zone to a wall-clock datetime.
    ///
    /// Ambiguous wall times (clocks turned back) resolve to the earlier
    /// instant. Wall times inside a gap (clocks turned forward) are moved one
    /// hour later.
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Named(tz) => localize_in(tz, naive),
            Self::Local => localize_in(&Local, naive),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(tz) => write!(f, "{}", tz.name()),
            Self::Local => write!(f, "Local"),
        }
    }
}

fn localize_in<Z: TimeZone>(tz: &Z, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.fixed_offset()),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.fixed_offset()),
        LocalResult::None => {
            let shifted = naive.checked_add_signed(Duration::hours(1))?;
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.fixed_offset())
        }
    }
}

/// Formats an instant for display, e.g. `Mon, Jan 15, 2024 at 2:00 PM +00:00`.
pub fn format_long(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%a, %b %-d, %Y at %-I:%M %p %:z").to_string()
}

/// Formats an instant compactly, e.g. `2024-01-15 14:00`.
pub fn format_short(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}
