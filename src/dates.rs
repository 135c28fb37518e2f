use chrono::{Local, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

// ASCII digits only; `\d` would also accept other Unicode digits.
static ISO_DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("static date pattern compiles")
});

/// Shape check only: 4-digit year, 2-digit month, 2-digit day.
/// Does not validate that the date exists on the calendar.
pub fn is_iso_date(value: &str) -> bool {
    ISO_DATE_PATTERN.is_match(value)
}

pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    if !is_iso_date(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, ISO_DATE_FORMAT).ok()
}

pub fn format_iso_date(date: NaiveDate) -> String {
    date.format(ISO_DATE_FORMAT).to_string()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn today_iso() -> String {
    format_iso_date(today())
}

/// e.g. "Thursday, January 29, 2026"
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// Whole calendar days from `from` to `to`; negative when `to` is earlier.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}

/// clap value parser for `YYYY-MM-DD` arguments.
pub fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_iso_date(value).ok_or_else(|| format!("expected a YYYY-MM-DD date, got '{}'", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_iso_date_strict_shape() {
        assert!(is_iso_date("2026-01-05"));
        assert!(!is_iso_date("2026-1-5"));
        assert!(!is_iso_date("2026-01-05T00:00:00Z"));
        assert!(!is_iso_date(" 2026-01-05"));
        assert!(!is_iso_date(""));
        assert!(!is_iso_date("２０２６-01-05"));
        // Shape-valid even though the calendar disagrees
        assert!(is_iso_date("2026-13-45"));
    }

    #[test]
    fn test_parse_iso_date_rejects_impossible_dates() {
        assert_eq!(parse_iso_date("2026-13-45"), None);
        assert_eq!(parse_iso_date("2026-1-5"), None);
        assert_eq!(
            parse_iso_date("2024-02-29"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn test_format_long_date() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 29).unwrap();
        assert_eq!(format_long_date(date), "Thursday, January 29, 2026");

        let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(format_long_date(date), "Wednesday, March 5, 2025");
    }

    #[test]
    fn test_days_between_crosses_leap_day() {
        let from = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(days_between(from, to), 2);
        assert_eq!(days_between(to, from), -2);
    }

    #[test]
    fn test_parse_date_arg_error_message() {
        let err = parse_date_arg("tomorrow").unwrap_err();
        assert!(err.contains("tomorrow"));
        assert!(parse_date_arg("2026-01-29").is_ok());
    }
}
