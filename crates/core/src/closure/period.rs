//! Billing period date helpers.

use chrono::NaiveDate;

/// Earliest year a closure may be created for.
pub const MIN_YEAR: i32 = 2000;
/// Latest year a closure may be created for.
pub const MAX_YEAR: i32 = 2100;

/// Returns the half-open date range `[start, next_start)` covering a billing
/// period, or `None` when month/year are out of bounds.
#[must_use]
pub fn period_bounds(month: u32, year: i32) -> Option<(NaiveDate, NaiveDate)> {
    if !(1..=12).contains(&month) || !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return None;
    }

    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_start = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };

    Some((start, next_start))
}

/// Returns a display label for a period, e.g. "May 2024".
#[must_use]
pub fn period_label(month: u32, year: i32) -> String {
    format!("{} {year}", month_name(month))
}

/// Returns month name.
fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, "January 2026")]
    #[case(5, "May 2026")]
    #[case(9, "September 2026")]
    #[case(12, "December 2026")]
    fn test_period_label_month_names(#[case] month: u32, #[case] expected: &str) {
        assert_eq!(period_label(month, 2026), expected);
    }

    #[test]
    fn test_period_bounds_mid_year() {
        let (start, next) = period_bounds(5, 2024).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn test_period_bounds_december_rolls_over() {
        let (start, next) = period_bounds(12, 2026).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 12, 1).unwrap());
        assert_eq!(next, NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
    }

    #[test]
    fn test_period_bounds_february_leap_year() {
        // The half-open range makes leap years a non-issue: February always
        // ends where March begins.
        let (start, next) = period_bounds(2, 2024).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_period_bounds_invalid_month() {
        assert!(period_bounds(0, 2024).is_none());
        assert!(period_bounds(13, 2024).is_none());
    }

    #[test]
    fn test_period_bounds_year_out_of_bounds() {
        assert!(period_bounds(1, MIN_YEAR - 1).is_none());
        assert!(period_bounds(1, MAX_YEAR + 1).is_none());
        assert!(period_bounds(1, MIN_YEAR).is_some());
        assert!(period_bounds(12, MAX_YEAR).is_some());
    }

}
