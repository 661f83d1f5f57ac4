use crate::api::attendance::{AttendanceEntry, CreateAttendance, UpdateAttendance};
use crate::api::student::{CreateStudent, UpdateStudent};
use crate::model::attendance::{AttendanceRecord, AttendanceWithStudent};
use crate::model::student::{ClassHistoryEntry, ContactInfo, Gender, Student, StudentStatus};
use crate::report::{Period, ReportRow};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "School Attendance API",
        version = "1.0.0",
        description = r#"
## School Attendance & Student Records

Backend for the school dashboard: daily attendance capture, student records and
attendance reports.

### Key Features
- **Attendance**
  - Record a day's attendance for many students in one request (upsert per student)
  - Correct a single entry, view a day's sheet with student details
- **Students**
  - Create, update, list and view student profiles; soft deactivation
- **Reports**
  - School, class, section and student reports bucketed by day, ISO week, month or year
  - Present, absent, late (within / after 5 minutes) counts and attendance percentage

### Security
Every `/api/v1` endpoint expects a **JWT Bearer** access token issued by the
auth service. What a caller may do depends on their role.

### Response Format
`{ "success": bool, "message"?: string, "data"?: any, "meta"?: object }`
"#,
    ),
    paths(
        crate::api::health::health,

        crate::api::attendance::get_attendance_by_date,
        crate::api::attendance::record_attendance,
        crate::api::attendance::update_attendance,

        crate::api::student::create_student,
        crate::api::student::list_students,
        crate::api::student::get_student,
        crate::api::student::update_student,
        crate::api::student::deactivate_student,

        crate::api::report::school_report,
        crate::api::report::class_report,
        crate::api::report::section_report,
        crate::api::report::student_report
    ),
    components(
        schemas(
            AttendanceEntry,
            CreateAttendance,
            UpdateAttendance,
            AttendanceRecord,
            AttendanceWithStudent,
            CreateStudent,
            UpdateStudent,
            Student,
            ContactInfo,
            ClassHistoryEntry,
            Gender,
            StudentStatus,
            Period,
            ReportRow
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Daily attendance capture"),
        (name = "Students", description = "Student records"),
        (name = "Reports", description = "Attendance reports"),
        (name = "Health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by the protected paths.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route_and_the_bearer_scheme() {
        let doc = ApiDoc::openapi();

        for path in [
            "/health",
            "/api/v1/attendance",
            "/api/v1/attendance/{attendance_id}",
            "/api/v1/students",
            "/api/v1/students/{student_id}",
            "/api/v1/reports/school",
            "/api/v1/reports/class",
            "/api/v1/reports/section",
            "/api/v1/reports/student/{student_id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
