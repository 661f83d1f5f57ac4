use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// One attendance fact per (student, date).
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: u64,
    #[serde(rename = "student")]
    pub student_id: u64,
    pub date: NaiveDate,
    pub present: bool,
    pub absent: bool,
    #[schema(example = "08:03")]
    pub late_entry: Option<String>,
    #[schema(example = "13:40")]
    pub early_leave: Option<String>,
    pub comment: Option<String>,
    pub entry_timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const ATTENDANCE_COLUMNS: &str = "id, student_id, date, present, absent, late_entry, \
    early_leave, comment, entry_timestamp, created_at, updated_at";

/// Attendance row with the student's name and placement joined in.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceWithStudent {
    pub id: u64,
    #[serde(rename = "student")]
    pub student_id: u64,
    pub student_name: String,
    pub current_class: i32,
    pub current_section: Option<String>,
    pub date: NaiveDate,
    pub present: bool,
    pub absent: bool,
    pub late_entry: Option<String>,
    pub early_leave: Option<String>,
    pub comment: Option<String>,
    pub entry_timestamp: Option<DateTime<Utc>>,
}
