use std::collections::HashMap;

use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::{
        attendance::{ATTENDANCE_COLUMNS, AttendanceRecord, AttendanceWithStudent},
        date::IsoDate,
        role::Capability,
        student::StudentStatus,
    },
    response::ApiResponse,
    utils::{
        db_utils::SqlUpdate,
        fields::{clearable, empty_as_none, is_clock_time, validate_clock_time},
        student_cache,
    },
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceDateQuery {
    /// `YYYY-MM-DD`
    #[param(value_type = String, example = "2024-03-01")]
    pub date: IsoDate,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    /// Student ID
    #[schema(example = 12)]
    pub student: u64,
    /// Defaults to `!absent`
    pub present: Option<bool>,
    pub absent: bool,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(custom(function = "validate_clock_time"))]
    #[schema(example = "08:03")]
    pub late_entry: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(custom(function = "validate_clock_time"))]
    pub early_leave: Option<String>,
    pub comment: Option<String>,
}

impl AttendanceEntry {
    pub fn present(&self) -> bool {
        self.present.unwrap_or(!self.absent)
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "date": "2024-03-01",
    "entries": [
        { "student": 12, "absent": false },
        { "student": 13, "absent": false, "lateEntry": "08:03" },
        { "student": 14, "absent": true, "comment": "fever" }
    ]
}))]
pub struct CreateAttendance {
    #[schema(value_type = String, format = Date, example = "2024-03-01")]
    pub date: IsoDate,
    #[validate(length(min = 1, message = "At least one entry is required"), nested)]
    pub entries: Vec<AttendanceEntry>,
}

impl CreateAttendance {
    fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.present() && entry.absent {
                return Err(AppError::validation(format!(
                    "entries[{index}] – present and absent cannot both be true"
                )));
            }
        }
        Ok(())
    }
}

/// Every field is optional; `null` clears the optional text fields.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAttendance {
    pub present: Option<bool>,
    pub absent: Option<bool>,
    #[serde(default, deserialize_with = "clearable")]
    #[schema(value_type = Option<String>, example = "08:10")]
    pub late_entry: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable")]
    #[schema(value_type = Option<String>)]
    pub early_leave: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable")]
    #[schema(value_type = Option<String>)]
    pub comment: Option<Option<String>>,
}

impl UpdateAttendance {
    fn into_update(self) -> Result<SqlUpdate, AppError> {
        for (field, value) in [("lateEntry", &self.late_entry), ("earlyLeave", &self.early_leave)] {
            if let Some(Some(time)) = value {
                if !is_clock_time(time) {
                    return Err(AppError::validation(format!(
                        "{field} – Invalid time format, expected \"HH:mm\""
                    )));
                }
            }
        }
        let (present, absent) = resolve_flags(self.present, self.absent)?;

        let mut update = SqlUpdate::new("attendance");
        update
            .set_if("present", present)
            .set_if("absent", absent)
            .set_if("late_entry", self.late_entry)
            .set_if("early_leave", self.early_leave)
            .set_if("comment", self.comment);

        if update.is_empty() {
            return Err(AppError::validation("No fields provided for update"));
        }
        Ok(update)
    }
}

/// Setting one flag to `true` clears the other, so whatever is stored the
/// row never ends up both present and absent.
fn resolve_flags(
    present: Option<bool>,
    absent: Option<bool>,
) -> Result<(Option<bool>, Option<bool>), AppError> {
    match (present, absent) {
        (Some(true), Some(true)) => Err(AppError::validation(
            "present and absent cannot both be true",
        )),
        (Some(true), None) => Ok((Some(true), Some(false))),
        (None, Some(true)) => Ok((Some(false), Some(true))),
        flags => Ok(flags),
    }
}

/// 404 for the first requested student that is missing or inactive.
fn ensure_active(student_ids: &[u64], found: &HashMap<u64, String>) -> Result<(), AppError> {
    for student_id in student_ids {
        match found.get(student_id).map(String::as_str) {
            Some(status) if status == StudentStatus::Active.as_ref() => {}
            Some(_) => {
                return Err(AppError::not_found(format!("Student {student_id} is inactive")));
            }
            None => return Err(AppError::not_found(format!("Student {student_id} not found"))),
        }
    }
    Ok(())
}

/// Attendance for one day
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(AttendanceDateQuery),
    responses(
        (status = 200, description = "Entries for the date with student details", body = [AttendanceWithStudent]),
        (status = 400, description = "Missing or invalid date"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "attendance_by_date", skip_all, fields(date = %query.date))]
pub async fn get_attendance_by_date(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceDateQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require(Capability::RecordAttendance)?;

    let date: NaiveDate = query.date.into();
    let entries = sqlx::query_as::<_, AttendanceWithStudent>(
        r#"
        SELECT a.id, a.student_id, s.name AS student_name, s.current_class, s.current_section,
               a.date, a.present, a.absent, a.late_entry, a.early_leave, a.comment, a.entry_timestamp
        FROM attendance a
        JOIN students s ON s.id = a.student_id
        WHERE a.date = ?
        AND s.status = 'active'
        ORDER BY s.current_class, s.current_section, s.name
        "#,
    )
    .bind(date)
    .fetch_all(pool.get_ref())
    .await?;

    debug!(count = entries.len(), "Fetched attendance entries");
    Ok(HttpResponse::Ok().json(ApiResponse::ok(entries)))
}

/// Record attendance for a day (upsert per student)
#[utoipa::path(
    post,
    path = "/api/v1/attendance",
    request_body = CreateAttendance,
    responses(
        (status = 200, description = "Stored records, one per entry", body = [AttendanceRecord]),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "success": false,
            "message": "entries[0].lateEntry – Invalid time format, expected \"HH:mm\""
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Unknown or inactive student")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(
    name = "record_attendance",
    skip_all,
    fields(date = %payload.date, entries = payload.entries.len(), recorded_by = %auth.username)
)]
pub async fn record_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateAttendance>,
) -> Result<HttpResponse, AppError> {
    auth.require(Capability::RecordAttendance)?;

    let saved = save_attendance(pool.get_ref(), &payload).await?;
    debug!(saved = saved.len(), "Attendance upserted");
    Ok(HttpResponse::Ok().json(ApiResponse::ok(saved)))
}

/// Upserts a day's entries in one transaction and returns the stored rows in
/// entry order.
pub async fn save_attendance(
    pool: &MySqlPool,
    payload: &CreateAttendance,
) -> Result<Vec<AttendanceRecord>, AppError> {
    payload.check()?;

    let date: NaiveDate = payload.date.into();
    let mut student_ids: Vec<u64> = payload.entries.iter().map(|e| e.student).collect();
    student_ids.sort_unstable();
    student_ids.dedup();

    for &student_id in &student_ids {
        if student_cache::is_known_inactive(student_id).await {
            return Err(AppError::not_found(format!("Student {student_id} is inactive")));
        }
    }

    let placeholders = vec!["?"; student_ids.len()].join(", ");
    let mut tx = pool.begin().await?;

    // shared locks keep a concurrent deactivation out until commit
    let status_sql = format!(
        "SELECT id, status FROM students WHERE id IN ({placeholders}) LOCK IN SHARE MODE"
    );
    let mut status_query = sqlx::query_as::<_, (u64, String)>(&status_sql);
    for student_id in &student_ids {
        status_query = status_query.bind(*student_id);
    }
    let found: HashMap<u64, String> = status_query.fetch_all(&mut *tx).await?.into_iter().collect();

    if let Err(err) = ensure_active(&student_ids, &found) {
        for (id, status) in &found {
            if status == StudentStatus::Inactive.as_ref() {
                student_cache::mark_inactive(*id).await;
            }
        }
        return Err(err);
    }

    let entry_timestamp = Utc::now();
    for entry in &payload.entries {
        sqlx::query(
            r#"
            INSERT INTO attendance
                (student_id, date, present, absent, late_entry, early_leave, comment, entry_timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                present = VALUES(present),
                absent = VALUES(absent),
                late_entry = VALUES(late_entry),
                early_leave = VALUES(early_leave),
                comment = VALUES(comment),
                entry_timestamp = VALUES(entry_timestamp)
            "#,
        )
        .bind(entry.student)
        .bind(date)
        .bind(entry.present())
        .bind(entry.absent)
        .bind(&entry.late_entry)
        .bind(&entry.early_leave)
        .bind(&entry.comment)
        .bind(entry_timestamp)
        .execute(&mut *tx)
        .await?;
    }

    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE date = ? AND student_id IN ({placeholders})"
    );
    let mut saved_query = sqlx::query_as::<_, AttendanceRecord>(&sql).bind(date);
    for student_id in &student_ids {
        saved_query = saved_query.bind(*student_id);
    }
    let saved = saved_query.fetch_all(&mut *tx).await?;

    tx.commit().await?;

    Ok(in_entry_order(&payload.entries, saved))
}

/// Orders stored rows like the submitted entries, one row per student.
fn in_entry_order(entries: &[AttendanceEntry], saved: Vec<AttendanceRecord>) -> Vec<AttendanceRecord> {
    let mut by_student: HashMap<u64, AttendanceRecord> =
        saved.into_iter().map(|r| (r.student_id, r)).collect();

    entries
        .iter()
        .filter_map(|entry| by_student.remove(&entry.student))
        .collect()
}

/// Update one attendance record
#[utoipa::path(
    put,
    path = "/api/v1/attendance/{attendance_id}",
    params(("attendance_id" = u64, Path, description = "Attendance record ID")),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Updated record", body = AttendanceRecord),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance not found", body = Object, example = json!({
            "success": false,
            "message": "Attendance not found"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "update_attendance", skip_all, fields(attendance_id = *path))]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdateAttendance>,
) -> Result<HttpResponse, AppError> {
    auth.require(Capability::RecordAttendance)?;

    let record = apply_attendance_update(pool.get_ref(), path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(record)))
}

/// Writes only the supplied fields and returns the stored row.
pub async fn apply_attendance_update(
    pool: &MySqlPool,
    attendance_id: u64,
    patch: UpdateAttendance,
) -> Result<AttendanceRecord, AppError> {
    let update = patch.into_update()?;

    let mut conn = pool.acquire().await?;
    update.execute(&mut *conn, "id", attendance_id).await?;

    sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?"
    ))
    .bind(attendance_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Attendance not found"))
}
