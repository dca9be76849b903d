//! Event duration parsing.
//!
//! A bare integer is a number of minutes (`30`). Anything else is a sequence
//! of `<number><unit>` segments such as `1h30m`, `1.5h` or `90s`, with
//! units `h`, `m`, `s` and `ms`.

use chrono::Duration;
use thiserror::Error;

/// Errors from [`parse_duration`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("empty duration: use formats like '30m', '1h', '1h30m', or just '30' for minutes")]
    Empty,

    #[error(
        "invalid duration '{input}' ({reason}): use formats like '30m', '1h', '1h30m', or just '30' for minutes"
    )]
    Invalid { input: String, reason: String },
}

fn invalid(input: &str, reason: impl Into<String>) -> DurationError {
    DurationError::Invalid {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// Parses a duration string.
///
/// Negative and zero spans parse successfully; callers that need a
/// positive duration check it themselves.
///
/// # Examples
///
/// ```
/// use calgo_core::duration::parse_duration;
/// use chrono::Duration;
///
/// assert_eq!(parse_duration("45").unwrap(), Duration::minutes(45));
/// assert_eq!(parse_duration("1h30m").unwrap(), Duration::minutes(90));
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    if let Ok(minutes) = s.parse::<i64>() {
        return Duration::try_minutes(minutes).ok_or_else(|| invalid(s, "out of range"));
    }

    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let mut total = Duration::zero();
    let mut segments = 0usize;
    let mut chars = body.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut number = String::new();
        while let Some(c) = chars.next_if(|c| c.is_ascii_digit() || *c == '.') {
            number.push(c);
        }
        if number.is_empty() {
            return Err(invalid(s, "expected a number before the unit"));
        }
        let value: f64 = number
            .parse()
            .map_err(|_| invalid(s, format!("invalid number '{number}'")))?;

        let mut unit = String::new();
        while let Some(c) = chars.next_if(|c| c.is_ascii_alphabetic()) {
            unit.push(c.to_ascii_lowercase());
        }
        let nanos_per_unit = match unit.as_str() {
            "h" => 3_600_000_000_000.0,
            "m" => 60_000_000_000.0,
            "s" => 1_000_000_000.0,
            "ms" => 1_000_000.0,
            "" => return Err(invalid(s, format!("missing unit after '{number}'"))),
            other => return Err(invalid(s, format!("unknown unit '{other}'"))),
        };

        let nanos = (value * nanos_per_unit).round();
        if !nanos.is_finite() || nanos >= i64::MAX as f64 {
            return Err(invalid(s, "out of range"));
        }
        total = total
            .checked_add(&Duration::nanoseconds(nanos as i64))
            .ok_or_else(|| invalid(s, "out of range"))?;
        segments += 1;
    }

    if segments == 0 {
        return Err(invalid(s, "no value"));
    }

    Ok(if negative { -total } else { total })
}

/// Renders a span as whole minutes, e.g. `90 min`.
pub fn format_minutes(span: Duration) -> String {
    format!("{} min", span.num_minutes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_integer_is_minutes() {
        assert_eq!(parse_duration("30").unwrap(), Duration::minutes(30));
        assert_eq!(parse_duration(" 90 ").unwrap(), Duration::minutes(90));
        assert_eq!(parse_duration("0").unwrap(), Duration::zero());
        assert_eq!(parse_duration("-15").unwrap(), Duration::minutes(-15));
    }

    #[test]
    fn compound_forms() {
        assert_eq!(parse_duration("1h").unwrap(), Duration::hours(1));
        assert_eq!(parse_duration("30m").unwrap(), Duration::minutes(30));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::minutes(90));
        assert_eq!(parse_duration("1h 30m").unwrap(), Duration::minutes(90));
        assert_eq!(parse_duration("90s").unwrap(), Duration::seconds(90));
        assert_eq!(parse_duration("1500ms").unwrap(), Duration::milliseconds(1500));
        assert_eq!(parse_duration("2H").unwrap(), Duration::hours(2));
    }

    #[test]
    fn decimals_and_sign() {
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::minutes(90));
        assert_eq!(parse_duration("0.5m").unwrap(), Duration::seconds(30));
        assert_eq!(parse_duration("-1h").unwrap(), Duration::hours(-1));
        assert_eq!(parse_duration("+45m").unwrap(), Duration::minutes(45));
    }

    #[test]
    fn rejects_garbage() {
        for input in ["abc", "1x", "h", "1.2.3h", "-", "30 minutes", "1h30"] {
            assert!(
                matches!(parse_duration(input), Err(DurationError::Invalid { .. })),
                "{input}"
            );
        }
    }

    #[test]
    fn empty_input() {
        assert_eq!(parse_duration("   "), Err(DurationError::Empty));
    }

    #[test]
    fn error_messages_list_examples() {
        let err = parse_duration("abc").unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"invalid duration 'abc' (expected a number before the unit): use formats like '30m', '1h', '1h30m', or just '30' for minutes"
        );
        let err = parse_duration("5y").unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"invalid duration '5y' (unknown unit 'y'): use formats like '30m', '1h', '1h30m', or just '30' for minutes"
        );
    }

    #[test]
    fn minutes_rendering() {
        assert_eq!(format_minutes(Duration::minutes(90)), "90 min");
        assert_eq!(format_minutes(Duration::seconds(150)), "2 min");
    }
}
