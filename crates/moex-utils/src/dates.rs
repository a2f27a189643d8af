//! Date helpers for trade dates and news lookback windows

use chrono::NaiveDate;
use thiserror::Error;

/// Date format used across the pipeline (`YYYY-MM-DD`)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors from date parsing
#[derive(Debug, Error)]
pub enum DateError {
    /// Input did not match `YYYY-MM-DD`
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Parse and echo back a date string, rejecting malformed input
pub fn validate_date(date: &str) -> Result<NaiveDate, DateError> {
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| DateError::InvalidDate(date.to_string()))
}

/// Compute the start of a lookback window ending at `date`
///
/// Used by the news tools to turn "current date + N days back" into an
/// explicit range for the upstream sources.
pub fn lookback_start(date: &str, days: i64) -> Result<String, DateError> {
    let end = validate_date(date)?;
    let start = end - chrono::Duration::days(days);
    Ok(start.format(DATE_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_date() {
        assert!(validate_date("2024-06-15").is_ok());
        assert!(validate_date("15.06.2024").is_err());
        assert!(validate_date("not-a-date").is_err());
    }

    #[test]
    fn test_lookback_start() {
        assert_eq!(lookback_start("2024-06-15", 7).unwrap(), "2024-06-08");
        assert_eq!(lookback_start("2024-01-03", 5).unwrap(), "2023-12-29");
    }

    #[test]
    fn test_lookback_start_invalid() {
        assert!(lookback_start("garbage", 7).is_err());
    }
}
