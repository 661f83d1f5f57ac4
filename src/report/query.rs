use futures::TryStreamExt;
use sqlx::MySqlPool;

use super::{
    aggregator::{AttendanceFact, ReportBuilder, ReportRow},
    filter::ReportFilter,
    lateness::LatenessPolicy,
};

// Typed bind values for the dynamic WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    U64(u64),
    I32(i32),
    Str(String),
    Date(chrono::NaiveDate),
}

/// SQL selecting the facts a report aggregates, plus its bind values in order.
pub fn build_report_query(filter: &ReportFilter) -> (String, Vec<FilterValue>) {
    let mut conditions = Vec::new();
    let mut bindings = Vec::new();

    if let Some(start) = filter.start_date {
        conditions.push("a.date >= ?");
        bindings.push(FilterValue::Date(start));
    }
    if let Some(end) = filter.end_date {
        conditions.push("a.date <= ?");
        bindings.push(FilterValue::Date(end));
    }

    let join = if let Some(student_id) = filter.student_id {
        conditions.push("a.student_id = ?");
        bindings.push(FilterValue::U64(student_id));
        ""
    } else if filter.needs_student_join() {
        if let Some(class) = filter.class {
            conditions.push("s.current_class = ?");
            bindings.push(FilterValue::I32(class.value()));
        }
        if let Some(section) = &filter.section {
            conditions.push("s.current_section = ?");
            bindings.push(FilterValue::Str(section.clone()));
        }
        " JOIN students s ON s.id = a.student_id"
    } else {
        ""
    };

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT a.date, a.present, a.absent, a.late_entry FROM attendance a{join}{where_clause}"
    );

    (sql, bindings)
}

/// Runs the single read for a report and folds the rows as they arrive.
pub async fn fetch_report(
    pool: &MySqlPool,
    filter: &ReportFilter,
    policy: LatenessPolicy,
) -> Result<Vec<ReportRow>, sqlx::Error> {
    let (sql, bindings) = build_report_query(filter);
    tracing::debug!(sql = %sql, bindings = ?bindings, "Running attendance report query");

    let mut query = sqlx::query_as::<_, AttendanceFact>(&sql);
    for value in bindings {
        query = match value {
            FilterValue::U64(v) => query.bind(v),
            FilterValue::I32(v) => query.bind(v),
            FilterValue::Str(v) => query.bind(v),
            FilterValue::Date(v) => query.bind(v),
        };
    }

    let mut builder = ReportBuilder::new(filter.period, policy);
    let mut rows = query.fetch(pool);
    while let Some(fact) = rows.try_next().await? {
        builder.push(&fact);
    }

    Ok(builder.finish())
}
