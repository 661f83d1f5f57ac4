//! Date bucketing for attendance reports.
//!
//! Attendance dates are stored as calendar dates (`DATE` columns) so no time
//! zone conversion happens here. Request dates given with a time component are
//! normalized to their UTC calendar date before they reach the store.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Reporting granularity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

/// ISO-8601 week. Field order gives the `(year, week)` sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IsoWeekKey {
    #[serde(rename = "year")]
    pub iso_week_year: i32,
    #[serde(rename = "week")]
    pub iso_week: u32,
}

/// Grouping identifier a date maps to under a [`Period`].
///
/// Labels are zero-padded so lexicographic order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BucketKey {
    Label(String),
    Week(IsoWeekKey),
}

impl Period {
    pub fn bucket(self, date: NaiveDate) -> BucketKey {
        match self {
            Period::Day => BucketKey::Label(date.format("%Y-%m-%d").to_string()),
            Period::Month => BucketKey::Label(date.format("%Y-%m").to_string()),
            Period::Year => BucketKey::Label(format!("{:04}", date.year())),
            Period::Week => {
                let week = date.iso_week();
                BucketKey::Week(IsoWeekKey {
                    iso_week_year: week.year(),
                    iso_week: week.week(),
                })
            }
        }
    }
}
