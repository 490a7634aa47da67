//! Time Range Resolution
//!
//! Turns the heterogeneous time expressions accepted on the command line
//! into absolute UTC instants:
//!
//! - ISO 8601: `2025-06-01T10:00:00Z`, `2025-06-01T10:00:00`, `2025-06-01`
//! - Unix epoch milliseconds: `1717243200000`
//! - Relative offsets from now: `30s`, `5m`, `2h`, `1d`, `now`
//! - Named ranges: `last-hour`, `last-24h`, `last-week`, `today`, `yesterday`
//!
//! Each expression is tried against the families in that order; the first
//! match wins. Named ranges are range-valued: used as the start with the
//! default end of `now`, they supply both ends, so `yesterday` means the
//! previous full UTC day rather than "since yesterday midnight". All
//! calendar arithmetic is anchored to UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};

const MILLIS_PER_SECOND: i64 = 1_000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

/// 2100-01-01T00:00:00Z. Epoch inputs past this are treated as typos.
const MAX_EPOCH_MILLIS: i64 = 4_102_444_800_000;

/// An absolute query window in UTC milliseconds.
///
/// `start` is inclusive, `end` exclusive, and `start < end` always holds
/// for a constructed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    /// Build a range, rejecting empty and inverted windows
    pub fn try_new(start: i64, end: i64) -> QueryResult<Self> {
        if start >= end {
            return Err(QueryError::InvalidTimeRange(format!(
                "start {} is not before end {}",
                format_instant(start),
                format_instant(end)
            )));
        }
        Ok(Self { start, end })
    }

    /// Resolve a pair of time expressions against a caller-supplied clock.
    ///
    /// The clock is a parameter rather than `Utc::now()` so that the same
    /// expressions resolve to the same instants under test.
    pub fn resolve(start_expr: &str, end_expr: &str, now: DateTime<Utc>) -> QueryResult<Self> {
        let start_token = start_expr.trim();
        let end_token = end_expr.trim();

        // A named start together with the default end keeps the named
        // pair's own end. "yesterday" stays the previous full day instead
        // of stretching to the current instant.
        if let Some(named) = NamedRange::parse(start_token) {
            if end_token.eq_ignore_ascii_case("now") {
                let (start, end) = named.resolve(now);
                return Self::try_new(start, end);
            }
        }

        let start = resolve_instant(start_token, now, Bound::Start)?;
        let end = resolve_instant(end_token, now, Bound::End)?;
        Self::try_new(start, end)
    }

    pub fn duration_millis(&self) -> i64 {
        self.end - self.start
    }

    pub fn start_rfc3339(&self) -> String {
        format_instant(self.start)
    }

    pub fn end_rfc3339(&self) -> String {
        format_instant(self.end)
    }
}

/// Named calendar ranges. Each resolves to a (start, end) pair so that a
/// range used on either side of the window contributes the matching edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedRange {
    LastHour,
    Last24h,
    LastWeek,
    Today,
    Yesterday,
}

impl NamedRange {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "last-hour" => Some(NamedRange::LastHour),
            "last-24h" | "last-day" => Some(NamedRange::Last24h),
            "last-week" => Some(NamedRange::LastWeek),
            "today" => Some(NamedRange::Today),
            "yesterday" => Some(NamedRange::Yesterday),
            _ => None,
        }
    }

    /// Resolve to (start, end) in UTC milliseconds
    pub fn resolve(self, now: DateTime<Utc>) -> (i64, i64) {
        let now_ms = now.timestamp_millis();
        match self {
            NamedRange::LastHour => (now_ms - MILLIS_PER_HOUR, now_ms),
            NamedRange::Last24h => (now_ms - MILLIS_PER_DAY, now_ms),
            NamedRange::LastWeek => (now_ms - 7 * MILLIS_PER_DAY, now_ms),
            NamedRange::Today => (utc_midnight(now), now_ms),
            NamedRange::Yesterday => {
                let midnight = utc_midnight(now);
                (midnight - MILLIS_PER_DAY, midnight)
            }
        }
    }
}

/// Which edge of the window an expression is resolving. Only named ranges
/// care: they contribute their start to the start bound and their end to
/// the end bound.
#[derive(Debug, Clone, Copy)]
enum Bound {
    Start,
    End,
}

fn resolve_instant(token: &str, now: DateTime<Utc>, bound: Bound) -> QueryResult<i64> {
    if token.is_empty() {
        return Err(QueryError::UnrecognizedTimeExpression(
            "(empty)".to_string(),
        ));
    }

    // Absolute timestamps
    if let Some(ms) = parse_absolute(token) {
        return Ok(ms);
    }

    // Epoch milliseconds. An all-digit token can match nothing else, so an
    // out-of-range value gets its own message instead of falling through.
    if token.bytes().all(|b| b.is_ascii_digit()) {
        if let Some(ms) = parse_epoch_millis(token) {
            return Ok(ms);
        }
        return Err(QueryError::UnrecognizedTimeExpression(format!(
            "{} (epoch milliseconds must fall between 1970 and 2100)",
            token
        )));
    }

    // Relative offsets
    let lowered = token.to_ascii_lowercase();
    if lowered == "now" {
        return Ok(now.timestamp_millis());
    }
    if let Some(ms) = parse_relative(&lowered, now) {
        return Ok(ms);
    }

    // Named ranges
    if let Some(named) = NamedRange::parse(token) {
        let (start, end) = named.resolve(now);
        return Ok(match bound {
            Bound::Start => start,
            Bound::End => end,
        });
    }

    Err(QueryError::UnrecognizedTimeExpression(format!(
        "{} (expected ISO 8601, epoch milliseconds, a relative offset like 30m, \
         or a named range like last-hour)",
        token
    )))
}

fn parse_absolute(token: &str) -> Option<i64> {
    // Full RFC 3339 with zone designator
    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Some(dt.timestamp_millis());
    }

    // Naive datetime, interpreted as UTC
    if let Ok(naive) = NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc().timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(token, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc().timestamp_millis());
    }

    // Date only, midnight UTC
    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp_millis());
    }

    None
}

fn parse_epoch_millis(token: &str) -> Option<i64> {
    let ms: i64 = token.parse().ok()?;
    if (0..MAX_EPOCH_MILLIS).contains(&ms) {
        Some(ms)
    } else {
        None
    }
}

fn parse_relative(lowered: &str, now: DateTime<Utc>) -> Option<i64> {
    let re = regex::Regex::new(r"^(\d+)([smhd])$").ok()?;
    let caps = re.captures(lowered)?;

    let amount: i64 = caps[1].parse().ok()?;
    let millis_per_unit = match &caps[2] {
        "s" => MILLIS_PER_SECOND,
        "m" => MILLIS_PER_MINUTE,
        "h" => MILLIS_PER_HOUR,
        "d" => MILLIS_PER_DAY,
        _ => return None,
    };

    let offset = amount.checked_mul(millis_per_unit)?;
    now.timestamp_millis().checked_sub(offset)
}

fn utc_midnight(now: DateTime<Utc>) -> i64 {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis()
}

/// Render a millisecond timestamp as UTC RFC 3339
pub fn format_instant(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| format!("{}ms", millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn ms(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn test_iso_with_zone() {
        let range = TimeRange::resolve("2025-06-01T10:00:00Z", "now", fixed_now()).unwrap();
        assert_eq!(range.start, ms(2025, 6, 1, 10, 0, 0));
        assert_eq!(range.end, fixed_now().timestamp_millis());
    }

    #[test]
    fn test_iso_with_offset_converts_to_utc() {
        let range = TimeRange::resolve("2025-06-01T12:00:00+02:00", "now", fixed_now()).unwrap();
        assert_eq!(range.start, ms(2025, 6, 1, 10, 0, 0));
    }

    #[test]
    fn test_naive_datetime_is_utc() {
        let range = TimeRange::resolve("2025-06-01T10:30:00", "now", fixed_now()).unwrap();
        assert_eq!(range.start, ms(2025, 6, 1, 10, 30, 0));
    }

    #[test]
    fn test_date_only_is_utc_midnight() {
        let range = TimeRange::resolve("2025-06-01", "now", fixed_now()).unwrap();
        assert_eq!(range.start, ms(2025, 6, 1, 0, 0, 0));
    }

    #[test]
    fn test_epoch_millis_pass_through() {
        let start = ms(2025, 6, 1, 10, 0, 0);
        let range = TimeRange::resolve(&start.to_string(), "now", fixed_now()).unwrap();
        assert_eq!(range.start, start);
    }

    #[test]
    fn test_epoch_out_of_range_is_rejected() {
        let err = TimeRange::resolve("9999999999999999", "now", fixed_now()).unwrap_err();
        assert!(matches!(err, QueryError::UnrecognizedTimeExpression(_)));
        assert!(err.message().contains("9999999999999999"));
    }

    #[test]
    fn test_iso_and_epoch_agree() {
        let from_iso = TimeRange::resolve("2025-06-01T10:00:00Z", "now", fixed_now()).unwrap();
        let from_epoch =
            TimeRange::resolve(&ms(2025, 6, 1, 10, 0, 0).to_string(), "now", fixed_now()).unwrap();
        assert_eq!(from_iso.start, from_epoch.start);
    }

    #[test]
    fn test_relative_offsets() {
        let now = fixed_now();
        let cases = [
            ("30s", 30 * MILLIS_PER_SECOND),
            ("5m", 5 * MILLIS_PER_MINUTE),
            ("2h", 2 * MILLIS_PER_HOUR),
            ("1d", MILLIS_PER_DAY),
        ];
        for (expr, offset) in cases {
            let range = TimeRange::resolve(expr, "now", now).unwrap();
            assert_eq!(range.start, now.timestamp_millis() - offset, "expr {}", expr);
            assert_eq!(range.end, now.timestamp_millis());
        }
    }

    #[test]
    fn test_one_hour_window() {
        let range = TimeRange::resolve("1h", "now", fixed_now()).unwrap();
        assert_eq!(range.start, ms(2025, 6, 1, 11, 0, 0));
        assert_eq!(range.end, ms(2025, 6, 1, 12, 0, 0));
        assert_eq!(range.duration_millis(), MILLIS_PER_HOUR);
    }

    #[test]
    fn test_huge_relative_offset_is_rejected() {
        let err = TimeRange::resolve("99999999999999999d", "now", fixed_now()).unwrap_err();
        assert!(matches!(err, QueryError::UnrecognizedTimeExpression(_)));
    }

    #[test]
    fn test_named_sliding_ranges() {
        let now = fixed_now();
        let now_ms = now.timestamp_millis();

        let (start, end) = NamedRange::LastHour.resolve(now);
        assert_eq!((start, end), (now_ms - MILLIS_PER_HOUR, now_ms));

        let (start, end) = NamedRange::Last24h.resolve(now);
        assert_eq!((start, end), (now_ms - MILLIS_PER_DAY, now_ms));

        let (start, end) = NamedRange::LastWeek.resolve(now);
        assert_eq!((start, end), (now_ms - 7 * MILLIS_PER_DAY, now_ms));
    }

    #[test]
    fn test_last_day_is_an_alias() {
        assert_eq!(NamedRange::parse("last-day"), Some(NamedRange::Last24h));
        assert_eq!(NamedRange::parse("last-24h"), Some(NamedRange::Last24h));
    }

    #[test]
    fn test_today_runs_from_midnight_to_now() {
        let range = TimeRange::resolve("today", "now", fixed_now()).unwrap();
        assert_eq!(range.start, ms(2025, 6, 1, 0, 0, 0));
        assert_eq!(range.end, fixed_now().timestamp_millis());
    }

    #[test]
    fn test_yesterday_is_the_previous_full_day() {
        // The default end of "now" must not stretch yesterday into today.
        let range = TimeRange::resolve("yesterday", "now", fixed_now()).unwrap();
        assert_eq!(range.start, ms(2025, 5, 31, 0, 0, 0));
        assert_eq!(range.end, ms(2025, 6, 1, 0, 0, 0));
    }

    #[test]
    fn test_named_start_with_explicit_end() {
        let range =
            TimeRange::resolve("yesterday", "2025-06-01T06:00:00Z", fixed_now()).unwrap();
        assert_eq!(range.start, ms(2025, 5, 31, 0, 0, 0));
        assert_eq!(range.end, ms(2025, 6, 1, 6, 0, 0));
    }

    #[test]
    fn test_named_end_contributes_its_end_edge() {
        let range = TimeRange::resolve("2025-05-01", "yesterday", fixed_now()).unwrap();
        assert_eq!(range.start, ms(2025, 5, 1, 0, 0, 0));
        assert_eq!(range.end, ms(2025, 6, 1, 0, 0, 0));
    }

    #[test]
    fn test_named_ranges_are_case_insensitive() {
        let range = TimeRange::resolve("LAST-HOUR", "NOW", fixed_now()).unwrap();
        assert_eq!(range.duration_millis(), MILLIS_PER_HOUR);
    }

    #[test]
    fn test_expressions_are_trimmed() {
        let range = TimeRange::resolve("  1h  ", " now ", fixed_now()).unwrap();
        assert_eq!(range.duration_millis(), MILLIS_PER_HOUR);
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = TimeRange::resolve("now", "1h", fixed_now()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidTimeRange(_)));
    }

    #[test]
    fn test_empty_range_is_rejected() {
        let err = TimeRange::resolve("now", "now", fixed_now()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidTimeRange(_)));
    }

    #[test]
    fn test_unrecognized_expression_names_the_token() {
        let err = TimeRange::resolve("soonish", "now", fixed_now()).unwrap_err();
        assert!(matches!(err, QueryError::UnrecognizedTimeExpression(_)));
        assert!(err.message().contains("soonish"));
    }

    #[test]
    fn test_format_instant() {
        assert_eq!(
            format_instant(ms(2025, 6, 1, 10, 0, 0)),
            "2025-06-01T10:00:00Z"
        );
    }
}
