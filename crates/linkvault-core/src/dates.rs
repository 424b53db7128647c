//! Relative date range resolution for saved searches.
//!
//! A relative date token is a closed-vocabulary string (`today`, `this_week`,
//! `last_7_days`, ...) that deterministically maps to a concrete inclusive
//! date range given a reference day. Searches storing a token re-derive their
//! range on every read instead of persisting concrete dates, so a saved
//! "last 7 days" filter stays current without rewriting the search.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Matches `last_N_unit` tokens, with or without the plural `s`.
static LAST_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^last_(\d+)_(day|week|month|year)s?$").expect("valid regex"));

/// Unit of a `last_N_unit` relative date token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl RelativeUnit {
    /// Plural unit name as used in query strings and form controls.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Days => "days",
            Self::Weeks => "weeks",
            Self::Months => "months",
            Self::Years => "years",
        }
    }

    /// Window length in days for one unit. Months and years use fixed 30/365
    /// day windows rather than calendar arithmetic; downstream behavior
    /// depends on this approximation, so it must not be "corrected".
    fn window_days(&self) -> i64 {
        match self {
            Self::Days => 1,
            Self::Weeks => 7,
            Self::Months => 30,
            Self::Years => 365,
        }
    }
}

/// Resolve a relative date token into a concrete inclusive `(start, end)`
/// range for the given reference day.
///
/// Closed vocabulary:
///
/// | token | start | end |
/// |---|---|---|
/// | `today` | today | today |
/// | `yesterday` | today-1 | today-1 |
/// | `this_week` | Monday of current week | Sunday of current week |
/// | `this_month` | 1st of month | last calendar day of month |
/// | `this_year` | Jan 1 | Dec 31 |
/// | `last_N_day(s)` | today-(N-1) | today |
/// | `last_N_week(s)` | today-(7N-1) | today |
/// | `last_N_month(s)` | today-(30N-1) | today |
/// | `last_N_year(s)` | today-(365N-1) | today |
///
/// An unrecognized token yields `None`, meaning "no derived range" — callers
/// must not treat it as an error.
pub fn resolve_relative_range(token: &str, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    match token {
        "today" => Some((today, today)),
        "yesterday" => {
            let yesterday = today - Duration::days(1);
            Some((yesterday, yesterday))
        }
        "this_week" => {
            let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
            Some((monday, monday + Duration::days(6)))
        }
        "this_month" => {
            let first = today.with_day(1)?;
            Some((first, last_day_of_month(today)))
        }
        "this_year" => {
            let first = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;
            let last = NaiveDate::from_ymd_opt(today.year(), 12, 31)?;
            Some((first, last))
        }
        _ => {
            let (count, unit) = split_relative_token(token)?;
            let days = unit.window_days().checked_mul(count as i64)?;
            let start = today.checked_sub_signed(Duration::days(days - 1))?;
            Some((start, today))
        }
    }
}

/// Decompose a `last_N_unit` token into its count and unit, for form display
/// and validation. Returns `None` for anything else, including the named
/// tokens (`today`, `this_week`, ...).
pub fn split_relative_token(token: &str) -> Option<(u32, RelativeUnit)> {
    let captures = LAST_RANGE_RE.captures(token)?;
    let count: u32 = captures.get(1)?.as_str().parse().ok()?;
    let unit = match captures.get(2)?.as_str() {
        "day" => RelativeUnit::Days,
        "week" => RelativeUnit::Weeks,
        "month" => RelativeUnit::Months,
        "year" => RelativeUnit::Years,
        _ => return None,
    };
    Some((count, unit))
}

fn last_day_of_month(day: NaiveDate) -> NaiveDate {
    let (next_year, next_month) = if day.month() == 12 {
        (day.year() + 1, 1)
    } else {
        (day.year(), day.month() + 1)
    };
    // The 1st of the following month always exists.
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .map(|d| d - Duration::days(1))
        .unwrap_or(day)
}

/// Largest epoch-seconds value representable before year 10000. Inputs above
/// this are re-interpreted as milliseconds, then microseconds.
const MAX_EPOCH_SECS: i64 = 253_402_300_799;

/// Parse a string of epoch digits into a `DateTime<Utc>`.
///
/// Tries seconds first; when the value exceeds the largest plausible
/// seconds timestamp it is retried as milliseconds, then as microseconds.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let raw: i64 = value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("{} is not a valid timestamp", value)))?;

    // unsigned_abs: plain abs() overflows on i64::MIN.
    let magnitude = raw.unsigned_abs();
    if magnitude <= MAX_EPOCH_SECS as u64 {
        if let Some(parsed) = DateTime::from_timestamp(raw, 0) {
            return Ok(parsed);
        }
    }
    if magnitude / 1000 <= MAX_EPOCH_SECS as u64 {
        if let Some(parsed) = DateTime::from_timestamp_millis(raw) {
            return Ok(parsed);
        }
    }
    if magnitude / 1_000_000 <= MAX_EPOCH_SECS as u64 {
        if let Some(parsed) = DateTime::from_timestamp_micros(raw) {
            return Ok(parsed);
        }
    }

    Err(Error::InvalidInput(format!(
        "{} exceeds maximum value for a timestamp",
        value
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_today_and_yesterday() {
        let today = date(2024, 6, 10);
        assert_eq!(
            resolve_relative_range("today", today),
            Some((today, today))
        );
        let yesterday = date(2024, 6, 9);
        assert_eq!(
            resolve_relative_range("yesterday", today),
            Some((yesterday, yesterday))
        );
    }

    #[test]
    fn test_this_week_brackets_a_wednesday() {
        // 2024-06-12 is a Wednesday; the week is Mon 2024-06-10 .. Sun 2024-06-16.
        let wednesday = date(2024, 6, 12);
        assert_eq!(
            resolve_relative_range("this_week", wednesday),
            Some((date(2024, 6, 10), date(2024, 6, 16)))
        );
    }

    #[test]
    fn test_this_week_on_a_monday_and_sunday() {
        let monday = date(2024, 6, 10);
        assert_eq!(
            resolve_relative_range("this_week", monday),
            Some((date(2024, 6, 10), date(2024, 6, 16)))
        );
        let sunday = date(2024, 6, 16);
        assert_eq!(
            resolve_relative_range("this_week", sunday),
            Some((date(2024, 6, 10), date(2024, 6, 16)))
        );
    }

    #[test]
    fn test_this_month_uses_calendar_days() {
        assert_eq!(
            resolve_relative_range("this_month", date(2024, 2, 15)),
            Some((date(2024, 2, 1), date(2024, 2, 29)))
        );
        assert_eq!(
            resolve_relative_range("this_month", date(2023, 2, 15)),
            Some((date(2023, 2, 1), date(2023, 2, 28)))
        );
        assert_eq!(
            resolve_relative_range("this_month", date(2024, 12, 3)),
            Some((date(2024, 12, 1), date(2024, 12, 31)))
        );
    }

    #[test]
    fn test_this_year() {
        assert_eq!(
            resolve_relative_range("this_year", date(2024, 6, 10)),
            Some((date(2024, 1, 1), date(2024, 12, 31)))
        );
    }

    #[test]
    fn test_last_7_days() {
        assert_eq!(
            resolve_relative_range("last_7_days", date(2024, 6, 10)),
            Some((date(2024, 6, 4), date(2024, 6, 10)))
        );
    }

    #[test]
    fn test_last_1_day_is_today_only() {
        let today = date(2024, 6, 10);
        assert_eq!(
            resolve_relative_range("last_1_day", today),
            Some((today, today))
        );
    }

    #[test]
    fn test_last_2_weeks() {
        assert_eq!(
            resolve_relative_range("last_2_weeks", date(2024, 6, 10)),
            Some((date(2024, 5, 28), date(2024, 6, 10)))
        );
    }

    #[test]
    fn test_last_months_and_years_use_fixed_windows() {
        // 30-day months and 365-day years, not calendar arithmetic.
        let today = date(2024, 6, 10);
        assert_eq!(
            resolve_relative_range("last_1_month", today),
            Some((today - Duration::days(29), today))
        );
        assert_eq!(
            resolve_relative_range("last_1_year", today),
            Some((today - Duration::days(364), today))
        );
    }

    #[test]
    fn test_singular_and_plural_accepted() {
        let today = date(2024, 6, 10);
        assert_eq!(
            resolve_relative_range("last_1_day", today),
            resolve_relative_range("last_1_days", today)
        );
    }

    #[test]
    fn test_unrecognized_token_yields_none() {
        let today = date(2024, 6, 10);
        assert_eq!(resolve_relative_range("", today), None);
        assert_eq!(resolve_relative_range("next_week", today), None);
        assert_eq!(resolve_relative_range("last_week", today), None);
        assert_eq!(resolve_relative_range("last_x_days", today), None);
    }

    #[test]
    fn test_start_never_after_end() {
        let today = date(2024, 6, 12);
        for token in [
            "today",
            "yesterday",
            "this_week",
            "this_month",
            "this_year",
            "last_1_day",
            "last_3_days",
            "last_2_weeks",
            "last_6_months",
            "last_10_years",
        ] {
            let (start, end) = resolve_relative_range(token, today).unwrap();
            assert!(start <= end, "start after end for {}", token);
        }
    }

    #[test]
    fn test_split_relative_token() {
        assert_eq!(
            split_relative_token("last_7_days"),
            Some((7, RelativeUnit::Days))
        );
        assert_eq!(
            split_relative_token("last_1_week"),
            Some((1, RelativeUnit::Weeks))
        );
        assert_eq!(
            split_relative_token("last_12_months"),
            Some((12, RelativeUnit::Months))
        );
        assert_eq!(
            split_relative_token("last_2_years"),
            Some((2, RelativeUnit::Years))
        );
        assert_eq!(split_relative_token("this_week"), None);
        assert_eq!(split_relative_token("last__days"), None);
    }

    #[test]
    fn test_relative_unit_as_str() {
        assert_eq!(RelativeUnit::Days.as_str(), "days");
        assert_eq!(RelativeUnit::Years.as_str(), "years");
    }

    #[test]
    fn test_parse_timestamp_seconds() {
        let parsed = parse_timestamp("1718000000").unwrap();
        assert_eq!(parsed.timestamp(), 1_718_000_000);
    }

    #[test]
    fn test_parse_timestamp_milliseconds() {
        let parsed = parse_timestamp("1718000000000").unwrap();
        assert_eq!(parsed.timestamp(), 1_718_000_000);
    }

    #[test]
    fn test_parse_timestamp_microseconds() {
        let parsed = parse_timestamp("1718000000000000").unwrap();
        assert_eq!(parsed.timestamp(), 1_718_000_000);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("not-a-number").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_parse_timestamp_rejects_out_of_range() {
        // Too large even for microseconds.
        assert!(parse_timestamp("9223372036854775807").is_err());
    }

    #[test]
    fn test_parse_timestamp_rejects_i64_min_without_panicking() {
        // i64::MIN has no positive counterpart; the magnitude check must
        // not negate it.
        assert!(parse_timestamp("-9223372036854775808").is_err());
    }
}
