//! Permissive date parsing for cursor seeds and command arguments.
//!
//! Accepts ISO-8601 / RFC 3339 timestamps (with or without subseconds or an
//! offset), bare dates, and the relative expressions the original fetch
//! configuration allowed ("2 weeks", "1 month ago", "yesterday"). Relative
//! expressions always resolve into the past. An unparseable value is a
//! configuration error, not a retryable condition.

use crate::error::{ConnectorError, ConnectorResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Parses a date expression relative to `now`.
pub fn parse_time(expr: &str, now: DateTime<Utc>) -> ConnectorResult<DateTime<Utc>> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(ConnectorError::Config(
            "empty string is not a valid date".to_string(),
        ));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default()));
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "now" | "today" => return Ok(now),
        "yesterday" => return Ok(now - Duration::days(1)),
        _ => {}
    }

    if let Some(offset) = parse_relative(trimmed) {
        return Ok(now - offset);
    }

    Err(ConnectorError::Config(format!(
        "\"{trimmed}\" is not a valid date"
    )))
}

/// Like [`parse_time`], but names the offending argument in the error.
pub fn parse_time_arg(
    arg_name: &str,
    expr: &str,
    now: DateTime<Utc>,
) -> ConnectorResult<DateTime<Utc>> {
    parse_time(expr, now)
        .map_err(|_| ConnectorError::Config(format!("Invalid date: \"{arg_name}\"=\"{expr}\"")))
}

/// Parses `"N <unit>"` with an optional trailing `"ago"` into a backwards
/// offset. Months and years are approximated the way the original lenient
/// parser did (30 and 365 days).
fn parse_relative(expr: &str) -> Option<Duration> {
    let lowered = expr.to_ascii_lowercase();
    let mut parts = lowered.split_whitespace();

    let amount: i64 = parts.next()?.parse().ok()?;
    if amount < 0 {
        return None;
    }
    let unit = parts.next()?;
    match parts.next() {
        None => {}
        Some("ago") if parts.next().is_none() => {}
        Some(_) => return None,
    }

    let duration = match unit.trim_end_matches('s') {
        "second" | "sec" => Duration::seconds(amount),
        "minute" | "min" => Duration::minutes(amount),
        "hour" | "hr" => Duration::hours(amount),
        "day" => Duration::days(amount),
        "week" => Duration::weeks(amount),
        "month" => Duration::days(amount * 30),
        "year" => Duration::days(amount * 365),
        _ => return None,
    };
    Some(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 45).unwrap()
    }

    fn assert_minute_eq(left: DateTime<Utc>, right: DateTime<Utc>) {
        assert_eq!(
            left.format("%Y-%m-%dT%H:%M").to_string(),
            right.format("%Y-%m-%dT%H:%M").to_string()
        );
    }

    #[test]
    fn parses_rfc3339_with_zulu_suffix() {
        let parsed = parse_time("2020-06-04T13:42:26.173Z", now()).unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2020, 6, 4, 13, 42, 26).unwrap()
                + Duration::milliseconds(173)
        );
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let parsed = parse_time("2020-06-04T15:42:26+02:00", now()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2020, 6, 4, 13, 42, 26).unwrap());
    }

    #[test]
    fn parses_naive_datetime_as_utc() {
        let parsed = parse_time("2020-06-04T13:42:26", now()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2020, 6, 4, 13, 42, 26).unwrap());
    }

    #[test]
    fn parses_bare_date_as_midnight_utc() {
        let parsed = parse_time("2020-06-04", now()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2020, 6, 4, 0, 0, 0).unwrap());
    }

    #[test]
    fn parses_relative_expressions_into_the_past() {
        assert_minute_eq(
            parse_time("2 weeks", now()).unwrap(),
            now() - Duration::weeks(2),
        );
        assert_minute_eq(
            parse_time("1 month", now()).unwrap(),
            now() - Duration::days(30),
        );
        assert_minute_eq(
            parse_time("3 days ago", now()).unwrap(),
            now() - Duration::days(3),
        );
        assert_minute_eq(
            parse_time("45 minutes ago", now()).unwrap(),
            now() - Duration::minutes(45),
        );
    }

    #[test]
    fn parses_named_anchors() {
        assert_minute_eq(parse_time("now", now()).unwrap(), now());
        assert_minute_eq(parse_time("Today", now()).unwrap(), now());
        assert_minute_eq(
            parse_time("yesterday", now()).unwrap(),
            now() - Duration::days(1),
        );
    }

    #[test]
    fn rejects_invalid_input() {
        for bad in ["invalid", "", "  ", "two weeks", "5 fortnights", "-3 days"] {
            assert!(matches!(
                parse_time(bad, now()),
                Err(ConnectorError::Config(_))
            ));
        }
    }

    #[test]
    fn arg_variant_names_the_argument() {
        let err = parse_time_arg("since_time", "garbage", now()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("since_time"));
        assert!(message.contains("garbage"));
    }
}
