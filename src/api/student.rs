use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool, types::Json};
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::{
        role::Capability,
        student::{
            ClassHistoryEntry, ClassLevel, ContactInfo, Gender, STUDENT_COLUMNS, Student, StudentRow,
            StudentStatus,
        },
    },
    response::ApiResponse,
    utils::{
        db_utils::{SqlUpdate, SqlValue, bind_value},
        enrollment_filter,
        fields::{clearable, empty_as_none},
        student_cache,
    },
};

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudent {
    #[validate(length(min = 1, message = "Name is required"))]
    #[schema(example = "Ayesha Rahman")]
    pub name: String,
    #[validate(length(min = 1, message = "Enrollment number is required"))]
    #[schema(example = "ENR-2024-0012")]
    pub enrollment_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    #[validate(nested)]
    pub contact_info: Option<ContactInfo>,
    /// Defaults to today
    pub admission_date: Option<NaiveDate>,
    #[schema(value_type = i32, example = 3)]
    pub current_class: ClassLevel,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub current_section: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub class_history: Vec<ClassHistoryEntry>,
}

/// Every field is optional; `null` clears the nullable ones.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudent {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Enrollment number cannot be empty"))]
    pub enrollment_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    #[validate(nested)]
    pub contact_info: Option<ContactInfo>,
    pub admission_date: Option<NaiveDate>,
    pub graduation_date: Option<NaiveDate>,
    #[schema(value_type = Option<i32>, example = 4)]
    pub current_class: Option<ClassLevel>,
    #[serde(default, deserialize_with = "clearable")]
    #[schema(value_type = Option<String>)]
    pub current_section: Option<Option<String>>,
    #[validate(nested)]
    pub class_history: Option<Vec<ClassHistoryEntry>>,
}

impl UpdateStudent {
    fn into_update(self) -> Result<SqlUpdate, AppError> {
        self.validate()?;

        let mut update = SqlUpdate::new("students");
        update
            .set_if("name", self.name.map(|s| s.trim().to_string()))
            .set_if(
                "enrollment_number",
                self.enrollment_number.map(|s| s.trim().to_string()),
            )
            .set_if("date_of_birth", self.date_of_birth)
            .set_if("gender", self.gender.map(|g| g.to_string()))
            .set_if("admission_date", self.admission_date)
            .set_if("graduation_date", self.graduation_date)
            .set_if("current_class", self.current_class.map(ClassLevel::value))
            .set_if("current_section", self.current_section);

        if let Some(contact_info) = self.contact_info {
            let value = serde_json::to_value(contact_info).map_err(anyhow::Error::from)?;
            update.set("contact_info", SqlValue::Json(value));
        }
        if let Some(class_history) = self.class_history {
            let value = serde_json::to_value(class_history).map_err(anyhow::Error::from)?;
            update.set("class_history", SqlValue::Json(value));
        }

        if update.is_empty() {
            return Err(AppError::validation("No fields provided for update"));
        }
        Ok(update)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StudentQuery {
    /// Starts at 1
    pub page: Option<u32>,
    /// Page size, at most 100
    pub limit: Option<u32>,
    /// `-1` Nursery, `0` KG, `1`-`12`; anything else is ignored
    pub class: Option<String>,
    pub section: Option<String>,
}

impl StudentQuery {
    /// `(page, page_size, offset)`
    fn pagination(&self) -> (u32, u32, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = u64::from(page - 1) * u64::from(page_size);
        (page, page_size, offset)
    }

    /// WHERE clause over active students plus its bind values.
    fn where_clause(&self) -> (String, Vec<SqlValue>) {
        let mut conditions = vec!["status = 'active'"];
        let mut bindings = Vec::new();

        if let Some(class) = self.class.as_deref().and_then(|c| c.parse::<ClassLevel>().ok()) {
            conditions.push("current_class = ?");
            bindings.push(SqlValue::I32(class.value()));
        }
        if let Some(section) = self.section.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            conditions.push("current_section = ?");
            bindings.push(SqlValue::String(section.to_string()));
        }

        (format!("WHERE {}", conditions.join(" AND ")), bindings)
    }
}

fn is_duplicate_key(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn duplicate_enrollment() -> AppError {
    AppError::Conflict("Enrollment number already exists".into())
}

async fn fetch_student(conn: &mut MySqlConnection, student_id: u64) -> Result<Option<Student>, AppError> {
    let row = sqlx::query_as::<_, StudentRow>(&format!(
        "SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?"
    ))
    .bind(student_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Student::try_from).transpose()?)
}

/// Create Student
#[utoipa::path(
    post,
    path = "/api/v1/students",
    request_body = CreateStudent,
    responses(
        (status = 201, description = "Student created", body = Student),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Duplicate enrollment number", body = Object, example = json!({
            "success": false,
            "message": "Enrollment number already exists"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(name = "create_student", skip_all, fields(enrollment_number = %payload.enrollment_number))]
pub async fn create_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateStudent>,
) -> Result<HttpResponse, AppError> {
    auth.require(Capability::ManageStudents)?;
    payload.validate()?;

    let payload = payload.into_inner();
    let enrollment_number = payload.enrollment_number.trim().to_string();

    // the filter only answers "definitely new"; a hit still needs the table
    if enrollment_filter::might_exist(&enrollment_number) {
        let taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM students WHERE enrollment_number = ?",
        )
        .bind(&enrollment_number)
        .fetch_one(pool.get_ref())
        .await?;

        if taken > 0 {
            return Err(duplicate_enrollment());
        }
    }

    let admission_date = payload
        .admission_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let mut conn = pool.acquire().await?;
    let inserted = sqlx::query(
        r#"
        INSERT INTO students
            (name, enrollment_number, date_of_birth, gender, contact_info, admission_date,
             current_class, current_section, status, class_history)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'active', ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(&enrollment_number)
    .bind(payload.date_of_birth)
    .bind(payload.gender.map(|g| g.to_string()))
    .bind(payload.contact_info.map(Json))
    .bind(admission_date)
    .bind(payload.current_class.value())
    .bind(&payload.current_section)
    .bind(Json(&payload.class_history))
    .execute(&mut *conn)
    .await
    .map_err(|e| if is_duplicate_key(&e) { duplicate_enrollment() } else { e.into() })?;

    let student_id = inserted.last_insert_id();
    enrollment_filter::insert(&enrollment_number);

    let student = fetch_student(&mut *conn, student_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("student {student_id} vanished after insert")))?;

    info!(student_id, "Student created");
    Ok(HttpResponse::Created().json(ApiResponse::with_message("Student created", student)))
}

/// List active students
#[utoipa::path(
    get,
    path = "/api/v1/students",
    params(StudentQuery),
    responses(
        (status = 200, description = "Active students sorted by name", body = [Student]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(name = "list_students", skip_all)]
pub async fn list_students(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StudentQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require(Capability::ManageStudents)?;

    let (page, page_size, offset) = query.pagination();
    let (where_clause, bindings) = query.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM students {where_clause}");
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
    for value in &bindings {
        count_query = bind_value(count_query, value);
    }
    let (total,) = count_query.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {STUDENT_COLUMNS} FROM students {where_clause} ORDER BY name LIMIT ? OFFSET ?"
    );
    debug!(sql = %data_sql, bindings = ?bindings, page, page_size, offset, "Fetching students");

    let mut data_query = sqlx::query_as::<_, StudentRow>(&data_sql);
    for value in &bindings {
        data_query = bind_value(data_query, value);
    }
    let rows = data_query
        .bind(page_size)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    let students = rows
        .into_iter()
        .map(Student::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(students).meta(json!({
        "page": page,
        "pageSize": page_size,
        "total": total,
    }))))
}

/// Get Student by ID
#[utoipa::path(
    get,
    path = "/api/v1/students/{student_id}",
    params(("student_id" = u64, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student found", body = Student),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Student not found or inactive", body = Object, example = json!({
            "success": false,
            "message": "Student is inactive"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(name = "get_student", skip_all, fields(student_id = *path))]
pub async fn get_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require(Capability::ManageStudents)?;

    let mut conn = pool.acquire().await?;
    let student = fetch_student(&mut *conn, path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Student not found"))?;

    if student.status == StudentStatus::Inactive {
        return Err(AppError::not_found("Student is inactive"));
    }

    Ok(HttpResponse::Ok().json(ApiResponse::ok(student)))
}

/// Update Student
#[utoipa::path(
    put,
    path = "/api/v1/students/{student_id}",
    params(("student_id" = u64, Path, description = "Student ID")),
    request_body = UpdateStudent,
    responses(
        (status = 200, description = "Student updated", body = Student),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Student not found or inactive"),
        (status = 409, description = "Duplicate enrollment number")
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(name = "update_student", skip_all, fields(student_id = *path))]
pub async fn update_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdateStudent>,
) -> Result<HttpResponse, AppError> {
    auth.require(Capability::ManageStudents)?;

    let student_id = path.into_inner();
    let new_enrollment = body
        .enrollment_number
        .as_deref()
        .map(|s| s.trim().to_string());
    let update = body.into_inner().into_update()?;

    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, (String, String)>(
        "SELECT enrollment_number, status FROM students WHERE id = ? FOR UPDATE",
    )
    .bind(student_id)
    .fetch_optional(&mut *tx)
    .await?;

    let old_enrollment = match current {
        Some((enrollment, status)) if status == StudentStatus::Active.as_ref() => enrollment,
        _ => return Err(AppError::not_found("Student not found or inactive")),
    };

    update
        .execute(&mut *tx, "id", student_id)
        .await
        .map_err(|e| match e {
            AppError::Database(db) if is_duplicate_key(&db) => duplicate_enrollment(),
            other => other,
        })?;

    let student = fetch_student(&mut *tx, student_id)
        .await?
        .ok_or_else(|| AppError::not_found("Student not found or inactive"))?;

    tx.commit().await?;

    if let Some(new_enrollment) = new_enrollment.filter(|n| *n != old_enrollment) {
        enrollment_filter::remove(&old_enrollment);
        enrollment_filter::insert(&new_enrollment);
    }

    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Student updated", student)))
}

/// Deactivate Student (soft delete)
#[utoipa::path(
    delete,
    path = "/api/v1/students/{student_id}",
    params(("student_id" = u64, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student marked inactive", body = Object, example = json!({
            "success": true,
            "message": "Student marked inactive"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Student not found or already inactive", body = Object, example = json!({
            "success": false,
            "message": "Student not found or already inactive"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(name = "deactivate_student", skip_all, fields(student_id = *path))]
pub async fn deactivate_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require(Capability::DeactivateStudents)?;

    let student_id = path.into_inner();
    let result = sqlx::query(
        "UPDATE students SET status = 'inactive' WHERE id = ? AND status = 'active'",
    )
    .bind(student_id)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Student not found or already inactive"));
    }

    student_cache::mark_inactive(student_id).await;
    info!(student_id, deactivated_by = %auth.username, "Student deactivated");

    Ok(HttpResponse::Ok().json(ApiResponse::message("Student marked inactive")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(raw: &str) -> StudentQuery {
        web::Query::<StudentQuery>::from_query(raw).unwrap().into_inner()
    }

    #[test]
    fn pagination_defaults_and_caps() {
        assert_eq!(query("").pagination(), (1, 10, 0));
        assert_eq!(query("page=3&limit=20").pagination(), (3, 20, 40));
        assert_eq!(query("page=0&limit=1000").pagination(), (1, 100, 0));
    }

    #[test]
    fn list_filter_keeps_active_and_valid_class() {
        let (sql, bindings) = query("class=KG&section=Girls").where_clause();
        assert_eq!(
            sql,
            "WHERE status = 'active' AND current_class = ? AND current_section = ?"
        );
        assert_eq!(
            bindings,
            vec![SqlValue::I32(0), SqlValue::String("Girls".into())]
        );

        let (sql, bindings) = query("class=Grade%205&section=%20").where_clause();
        assert_eq!(sql, "WHERE status = 'active'");
        assert!(bindings.is_empty());
    }

    #[test]
    fn create_payload_accepts_class_names() {
        let payload: CreateStudent = serde_json::from_value(json!({
            "name": "Rafi",
            "enrollmentNumber": "ENR-7",
            "currentClass": "Nursery",
            "gender": "M"
        }))
        .unwrap();

        assert_eq!(payload.current_class, ClassLevel::NURSERY);
        assert!(payload.class_history.is_empty());
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn create_payload_rejects_unknown_gender_and_class() {
        let bad_gender = serde_json::from_value::<CreateStudent>(json!({
            "name": "Rafi", "enrollmentNumber": "ENR-7", "currentClass": 1, "gender": "X"
        }));
        assert!(bad_gender.is_err());

        let bad_class = serde_json::from_value::<CreateStudent>(json!({
            "name": "Rafi", "enrollmentNumber": "ENR-7", "currentClass": 13
        }));
        assert!(bad_class.is_err());
    }

    #[test]
    fn nested_contact_email_is_reported_with_path() {
        let payload: CreateStudent = serde_json::from_value(json!({
            "name": "Rafi",
            "enrollmentNumber": "ENR-7",
            "currentClass": 2,
            "contactInfo": { "email": "nope" }
        }))
        .unwrap();

        let err = AppError::from(payload.validate().unwrap_err()).to_string();
        assert_eq!(err, "contactInfo.email – Invalid email");
    }

    #[test]
    fn empty_update_is_rejected() {
        let err = UpdateStudent::default().into_update().unwrap_err();
        assert_eq!(err.to_string(), "No fields provided for update");
    }

    #[test]
    fn update_maps_fields_to_columns() {
        let patch: UpdateStudent = serde_json::from_value(json!({
            "currentClass": "kg",
            "currentSection": null,
            "contactInfo": { "motherPhone": "+8801700000000" }
        }))
        .unwrap();

        let sql = patch.into_update().unwrap().to_sql("id").unwrap();
        assert_eq!(
            sql,
            "UPDATE students SET current_class = ?, current_section = ?, contact_info = ? WHERE id = ?"
        );
    }

    #[test]
    fn blank_name_update_is_rejected() {
        let patch: UpdateStudent = serde_json::from_value(json!({ "name": "" })).unwrap();
        assert!(matches!(patch.into_update(), Err(AppError::Validation(_))));
    }
}
