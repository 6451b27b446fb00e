//! Calendar date value used for expiry, receipt and operation dates.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{DomainError, DomainResult};

/// Earliest year accepted by [`DateValue::new`].
pub const MIN_YEAR: i32 = 1900;

/// An immutable calendar date, written as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateValue(NaiveDate);

impl DateValue {
    /// Build a date, failing on anything that is not a real calendar day.
    pub fn new(year: i32, month: u32, day: u32) -> DomainResult<Self> {
        if year < MIN_YEAR {
            return Err(DomainError::InvalidDate(format!(
                "year {} is before {}",
                year, MIN_YEAR
            )));
        }
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| {
                DomainError::InvalidDate(format!("{:04}-{:02}-{:02}", year, month, day))
            })
    }

    /// Today's date on the local clock.
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// True when this date lies strictly before today. Evaluated on every call.
    pub fn is_expired(&self) -> bool {
        self.0 < Local::now().date_naive()
    }

    /// Whole days from today until this date (negative once passed).
    pub fn days_until(&self) -> i64 {
        (self.0 - Local::now().date_naive()).num_days()
    }
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year(), self.month(), self.day())
    }
}

impl FromStr for DateValue {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidDate(s.to_string());
        let parts: Vec<&str> = s.trim().split('-').collect();
        let [year, month, day] = parts[..] else {
            return Err(invalid());
        };
        if year.len() != 4 || month.len() != 2 || day.len() != 2 {
            return Err(invalid());
        }
        let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
        if !(all_digits(year) && all_digits(month) && all_digits(day)) {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        let day = day.parse().map_err(|_| invalid())?;
        Self::new(year, month, day)
    }
}

impl TryFrom<String> for DateValue {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateValue> for String {
    fn from(date: DateValue) -> Self {
        date.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_date() {
        let date = DateValue::new(2024, 2, 29).unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 2);
        assert_eq!(date.day(), 29);
    }

    #[test]
    fn test_no_silent_normalization() {
        // April has 30 days; this must not become May 1
        assert!(DateValue::new(2025, 4, 31).is_err());
        assert!(DateValue::new(2023, 2, 29).is_err());
        assert!(DateValue::new(2025, 13, 1).is_err());
        assert!(DateValue::new(2025, 0, 10).is_err());
    }

    #[test]
    fn test_year_lower_bound() {
        assert!(DateValue::new(1899, 12, 31).is_err());
        assert!(DateValue::new(1900, 1, 1).is_ok());
    }

    #[test]
    fn test_display_format() {
        let date = DateValue::new(2026, 3, 7).unwrap();
        assert_eq!(date.to_string(), "2026-03-07");
    }

    #[test]
    fn test_parse() {
        let date: DateValue = "2026-03-07".parse().unwrap();
        assert_eq!(date, DateValue::new(2026, 3, 7).unwrap());

        assert!("2026-3-7".parse::<DateValue>().is_err());
        assert!("07.03.2026".parse::<DateValue>().is_err());
        assert!("2026-04-31".parse::<DateValue>().is_err());
        assert!("".parse::<DateValue>().is_err());
    }

    #[test]
    fn test_expiry() {
        assert!(DateValue::new(2000, 1, 1).unwrap().is_expired());
        assert!(!DateValue::new(2999, 12, 31).unwrap().is_expired());
        assert!(!DateValue::today().is_expired());
    }

    #[test]
    fn test_ordering() {
        let a = DateValue::new(2025, 1, 1).unwrap();
        let b = DateValue::new(2025, 1, 2).unwrap();
        assert!(a < b);
    }
}
