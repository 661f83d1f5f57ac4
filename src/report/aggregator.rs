use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{
    lateness::{Lateness, LatenessPolicy},
    period::{BucketKey, Period},
};

/// The slice of an attendance record the report needs.
#[derive(Debug, Clone, FromRow)]
pub struct AttendanceFact {
    pub date: NaiveDate,
    pub present: bool,
    pub absent: bool,
    pub late_entry: Option<String>,
}

/// One summary row per non-empty bucket.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "period": "2024-03-01",
    "presentCount": 2,
    "absentCount": 1,
    "lateWithin5": 1,
    "lateAfter5": 0,
    "totalCount": 3,
    "attendancePct": 66.7
}))]
pub struct ReportRow {
    /// `"YYYY-MM-DD"`, `"YYYY-MM"`, `"YYYY"` or `{ "year": .., "week": .. }`
    #[schema(value_type = Object)]
    pub period: BucketKey,
    pub present_count: u64,
    pub absent_count: u64,
    pub late_within5: u64,
    pub late_after5: u64,
    pub total_count: u64,
    pub attendance_pct: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    present: u64,
    absent: u64,
    late_within5: u64,
    late_after5: u64,
    total: u64,
}

impl Tally {
    fn add(&mut self, fact: &AttendanceFact, policy: &LatenessPolicy) {
        self.total += 1;
        if fact.present {
            self.present += 1;
        }
        if fact.absent {
            self.absent += 1;
        }
        match policy.classify(fact.present, fact.late_entry.as_deref()) {
            Some(Lateness::Within5) => self.late_within5 += 1,
            Some(Lateness::After5) => self.late_after5 += 1,
            None => {}
        }
    }

    fn into_row(self, period: BucketKey) -> ReportRow {
        ReportRow {
            period,
            present_count: self.present,
            absent_count: self.absent,
            late_within5: self.late_within5,
            late_after5: self.late_after5,
            total_count: self.total,
            attendance_pct: attendance_pct(self.present, self.total),
        }
    }
}

/// `present / total * 100` rounded to one decimal, `0` for an empty bucket.
pub fn attendance_pct(present: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = present as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Incremental aggregation so rows can be folded in as they stream from the store.
#[derive(Debug)]
pub struct ReportBuilder {
    period: Period,
    policy: LatenessPolicy,
    buckets: BTreeMap<BucketKey, Tally>,
}

impl ReportBuilder {
    pub fn new(period: Period, policy: LatenessPolicy) -> Self {
        Self {
            period,
            policy,
            buckets: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, fact: &AttendanceFact) {
        self.buckets
            .entry(self.period.bucket(fact.date))
            .or_default()
            .add(fact, &self.policy);
    }

    /// Rows in ascending bucket order.
    pub fn finish(self) -> Vec<ReportRow> {
        self.buckets
            .into_iter()
            .map(|(key, tally)| tally.into_row(key))
            .collect()
    }
}

pub fn aggregate<'a, I>(facts: I, period: Period, policy: LatenessPolicy) -> Vec<ReportRow>
where
    I: IntoIterator<Item = &'a AttendanceFact>,
{
    let mut builder = ReportBuilder::new(period, policy);
    for fact in facts {
        builder.push(fact);
    }
    builder.finish()
}
