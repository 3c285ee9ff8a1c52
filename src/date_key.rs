//! Calendar date keys.
//!
//! A date key is the local wall-clock day formatted as `YYYY-MM-DD`. Keys are
//! built from the calendar fields directly so no timezone offset can shift a
//! day across midnight.

use chrono::{Datelike, Duration, NaiveDate};

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Format a day as its canonical key.
pub fn format(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// Parse a canonical `YYYY-MM-DD` key.
pub fn parse(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key.trim(), DATE_KEY_FORMAT).ok()
}

/// Resolve a day reference typed by the user: `today`, `yesterday`,
/// `tomorrow`, or a date key.
pub fn resolve(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    match input.trim().to_lowercase().as_str() {
        "today" | "now" => Some(today),
        "yesterday" => Some(today - Duration::days(1)),
        "tomorrow" => Some(today + Duration::days(1)),
        other => parse(other),
    }
}

/// Today's date in the local calendar.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Every day from `start` to `end`, both inclusive. Empty if `end < start`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn formats_with_zero_padding() {
        assert_eq!(format(d(2024, 1, 5)), "2024-01-05");
        assert_eq!(format(d(987, 12, 31)), "0987-12-31");
    }

    #[test]
    fn parses_canonical_keys() {
        assert_eq!(parse("2024-02-29"), Some(d(2024, 2, 29)));
        assert_eq!(parse(" 2024-03-01 "), Some(d(2024, 3, 1)));
        assert_eq!(parse("2023-02-29"), None);
        assert_eq!(parse("01-02-2024"), None);
    }

    #[test]
    fn resolves_relative_references() {
        let today = d(2024, 3, 1);
        assert_eq!(resolve("today", today), Some(today));
        assert_eq!(resolve("Yesterday", today), Some(d(2024, 2, 29)));
        assert_eq!(resolve("tomorrow", today), Some(d(2024, 3, 2)));
        assert_eq!(resolve("2024-01-01", today), Some(d(2024, 1, 1)));
        assert_eq!(resolve("someday", today), None);
    }

    #[test]
    fn inclusive_day_range() {
        let days: Vec<_> = days_inclusive(d(2024, 2, 28), d(2024, 3, 1)).collect();
        assert_eq!(days, vec![d(2024, 2, 28), d(2024, 2, 29), d(2024, 3, 1)]);
        assert_eq!(days_inclusive(d(2024, 3, 2), d(2024, 3, 1)).count(), 0);
    }
}
