use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A calendar date accepted as `YYYY-MM-DD` or as an RFC 3339 timestamp,
/// which is reduced to its UTC calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IsoDate(pub NaiveDate);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid date {0:?}, expected YYYY-MM-DD")]
pub struct InvalidDate(pub String);

impl FromStr for IsoDate {
    type Err = InvalidDate;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(IsoDate(date));
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| IsoDate(dt.with_timezone(&Utc).date_naive()))
            .map_err(|_| InvalidDate(raw.to_string()))
    }
}

impl TryFrom<String> for IsoDate {
    type Error = InvalidDate;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IsoDate> for String {
    fn from(value: IsoDate) -> Self {
        value.to_string()
    }
}

impl From<IsoDate> for NaiveDate {
    fn from(value: IsoDate) -> Self {
        value.0
    }
}

impl fmt::Display for IsoDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}
