//! Attendance reporting: date bucketing, lateness classification and the
//! aggregation shared by the school, class, section and student reports.

pub mod aggregator;
pub mod filter;
pub mod lateness;
pub mod period;
pub mod query;

use std::time::Duration;

use sqlx::MySqlPool;

pub use aggregator::{AttendanceFact, ReportRow, aggregate};
pub use filter::ReportFilter;
pub use lateness::LatenessPolicy;
pub use period::{BucketKey, IsoWeekKey, Period};

use crate::error::AppError;

/// Runs one report against the store, bounded by `timeout`.
///
/// An empty result is a valid report, never an error.
pub async fn run_report(
    pool: &MySqlPool,
    filter: &ReportFilter,
    policy: LatenessPolicy,
    timeout: Duration,
) -> Result<Vec<ReportRow>, AppError> {
    match actix_web::rt::time::timeout(timeout, query::fetch_report(pool, filter, policy)).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => {
            tracing::error!(filter = ?filter, timeout_secs = timeout.as_secs(), "Attendance report timed out");
            Err(AppError::Timeout)
        }
    }
}
