use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::de;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Inclusive day-granularity date range.
///
/// Timestamps are truncated to their UTC day before any comparison, so a
/// snapshot taken at 23:59 on the range's last day is still inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    /// Create a range; `from` must not be after `to`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(Error::validation(format!(
                "invalid date range - from: {from} is after to: {to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// The range covering the `days` days up to (and including) `to`.
    pub fn n_days_back(days: i64, to: DateTime<Utc>) -> Self {
        let to = to.date_naive();
        Self {
            from: to - Duration::days(days),
            to,
        }
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// True when the whole range lies before `other`'s day
    /// (`other` is too new).
    pub fn is_before(&self, other: DateTime<Utc>) -> bool {
        self.to < other.date_naive()
    }

    /// True when the whole range lies after `other`'s day
    /// (`other` is too old).
    pub fn is_after(&self, other: DateTime<Utc>) -> bool {
        self.from > other.date_naive()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "between {} and {}", self.from, self.to)
    }
}

/// Accepts `{from, to}`, `{from, days}` or `{to, days}`.
impl<'de> Deserialize<'de> for DateRange {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            from: Option<NaiveDate>,
            #[serde(default)]
            to: Option<NaiveDate>,
            #[serde(default)]
            days: Option<i64>,
        }

        const EXPECTED: &str = "expected fields: [from, to | from, days | to, days]";

        let raw = Raw::deserialize(deserializer)?;
        match (raw.from, raw.to, raw.days) {
            (Some(from), Some(to), _) => DateRange::new(from, to).map_err(de::Error::custom),
            (Some(from), None, Some(days)) => Ok(DateRange {
                from,
                to: from + Duration::days(days),
            }),
            (None, Some(to), Some(days)) => Ok(DateRange {
                from: to - Duration::days(days),
                to,
            }),
            _ => Err(de::Error::custom(EXPECTED)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn datetime(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_invalid_range() {
        assert!(DateRange::new(date(2020, 1, 1), date(2019, 1, 1)).is_err());
    }

    #[test]
    fn test_0_days_back() {
        let dr = DateRange::n_days_back(0, datetime(2020, 1, 1, 12));
        assert_eq!(dr.from(), date(2020, 1, 1));
        assert_eq!(dr.to(), date(2020, 1, 1));
    }

    #[test]
    fn test_1_day_back() {
        let dr = DateRange::n_days_back(1, datetime(2020, 1, 2, 12));
        assert_eq!(dr.from(), date(2020, 1, 1));
    }

    #[test]
    fn test_is_before() {
        let dr = DateRange::new(date(2020, 1, 1), date(2020, 1, 2)).unwrap();
        // inside the range, even late in the day
        assert!(!dr.is_before(datetime(2020, 1, 1, 23)));
        assert!(!dr.is_before(datetime(2020, 1, 2, 23)));
        // the day after the range is too new
        assert!(dr.is_before(datetime(2020, 1, 3, 0)));
    }

    #[test]
    fn test_is_after() {
        let dr = DateRange::new(date(2020, 1, 2), date(2020, 1, 3)).unwrap();
        assert!(!dr.is_after(datetime(2020, 1, 3, 0)));
        assert!(!dr.is_after(datetime(2020, 1, 2, 0)));
        assert!(dr.is_after(datetime(2020, 1, 1, 23)));
    }

    #[test]
    fn test_deserialize_with_to_and_days() {
        let dr: DateRange = serde_json::from_str(r#"{"to": "2019-02-03", "days": 1}"#).unwrap();
        assert_eq!(dr.from(), date(2019, 2, 2));
        assert_eq!(dr.to(), date(2019, 2, 3));
    }

    #[test]
    fn test_deserialize_with_from_and_days() {
        let dr: DateRange = serde_json::from_str(r#"{"from": "2019-02-03", "days": 1}"#).unwrap();
        assert_eq!(dr.to(), date(2019, 2, 4));
    }

    #[test]
    fn test_deserialize_incomplete() {
        assert!(serde_json::from_str::<DateRange>(r#"{"days": 3}"#).is_err());
        assert!(serde_json::from_str::<DateRange>(r#"{"from": "2019-02-03"}"#).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let dr = DateRange::n_days_back(1, Utc::now());
        let json = serde_json::to_string(&dr).unwrap();
        let back: DateRange = serde_json::from_str(&json).unwrap();
        assert_eq!(dr, back);
    }
}
