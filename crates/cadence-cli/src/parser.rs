use anyhow::{anyhow, Result};
use cadence_core::models::{parse_day_set, DayOfWeek};
use chrono::{NaiveDate, TimeZone, Utc};
use chrono_english::{parse_date_string, Dialect};
use std::collections::BTreeSet;

/// Parses a calendar date: ISO `YYYY-MM-DD` first, then natural language
/// ("today", "tomorrow", "next friday") relative to `today`.
pub fn parse_date(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date);
    }

    // Anchor at noon so relative offsets cannot cross a day boundary
    let noon = today
        .and_hms_opt(12, 0, 0)
        .ok_or_else(|| anyhow!("Invalid reference date {}", today))?;
    let now = Utc.from_utc_datetime(&noon);

    parse_date_string(input, now, Dialect::Us)
        .map(|parsed| parsed.date_naive())
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", input, e))
}

pub fn parse_optional_date(input: Option<&str>, today: NaiveDate) -> Result<Option<NaiveDate>> {
    input.map(|s| parse_date(s, today)).transpose()
}

/// Parses a comma-separated weekday list such as "mon,wed,fri".
pub fn parse_days(input: &str) -> Result<BTreeSet<DayOfWeek>> {
    let days = parse_day_set(input).map_err(|e| anyhow!("{}", e))?;
    if days.is_empty() {
        return Err(anyhow!("No days given in '{}'", input));
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn today() -> NaiveDate {
        // a Wednesday
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    #[rstest]
    #[case("2024-03-01", 2024, 3, 1)]
    #[case("today", 2024, 1, 10)]
    #[case("tomorrow", 2024, 1, 11)]
    #[case("yesterday", 2024, 1, 9)]
    fn test_parse_date(#[case] input: &str, #[case] y: i32, #[case] m: u32, #[case] d: u32) {
        assert_eq!(parse_date(input, today()).unwrap(), NaiveDate::from_ymd_opt(y, m, d).unwrap());
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("not a date", today()).is_err());
    }

    #[test]
    fn test_parse_days() {
        let days = parse_days("mon, wed,Fri").unwrap();
        assert_eq!(days.into_iter().collect::<Vec<_>>(), vec![DayOfWeek::Mon, DayOfWeek::Wed, DayOfWeek::Fri]);
        assert!(parse_days("mon,funday").is_err());
        assert!(parse_days("").is_err());
    }

    #[test]
    fn test_parse_optional_date() {
        assert_eq!(parse_optional_date(None, today()).unwrap(), None);
        assert_eq!(
            parse_optional_date(Some("tomorrow"), today()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 11)
        );
    }
}
