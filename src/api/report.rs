use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::instrument;
use utoipa::IntoParams;

use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::{date::IsoDate, role::Capability},
    report::{Period, ReportFilter, ReportRow, run_report},
    response::ApiResponse,
};

/// Query accepted by every report endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// `day`, `week`, `month` or `year`
    #[param(value_type = String, example = "day")]
    pub period: Period,
    /// Inclusive lower bound, `YYYY-MM-DD`
    #[param(value_type = Option<String>, example = "2024-03-01")]
    pub start_date: Option<IsoDate>,
    /// Inclusive upper bound, `YYYY-MM-DD`
    #[param(value_type = Option<String>, example = "2024-03-31")]
    pub end_date: Option<IsoDate>,
    /// `-1` Nursery, `0` KG, `1`-`12`; anything else is ignored
    #[param(example = "5")]
    pub class: Option<String>,
    #[param(example = "Girls")]
    pub section: Option<String>,
}

impl ReportQuery {
    fn base_filter(&self) -> Result<ReportFilter, AppError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(AppError::validation("startDate cannot be after endDate"));
            }
        }
        Ok(ReportFilter::new(
            self.period,
            self.start_date.map(Into::into),
            self.end_date.map(Into::into),
        ))
    }
}

async fn respond(
    pool: &MySqlPool,
    config: &Config,
    filter: ReportFilter,
) -> Result<HttpResponse, AppError> {
    let rows = run_report(pool, &filter, config.lateness_policy, config.query_timeout).await?;
    tracing::debug!(rows = rows.len(), "Report ready");
    Ok(HttpResponse::Ok().json(ApiResponse::ok(rows)))
}

/// School-wide attendance
#[utoipa::path(
    get,
    path = "/api/v1/reports/school",
    params(ReportQuery),
    responses(
        (status = 200, description = "One row per period bucket", body = [ReportRow]),
        (status = 400, description = "Invalid query"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
#[instrument(name = "school_report", skip_all, fields(period = %query.period))]
pub async fn school_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require(Capability::ViewReports)?;

    let filter = query.base_filter()?;
    respond(pool.get_ref(), &config, filter).await
}

/// Class-wise attendance
#[utoipa::path(
    get,
    path = "/api/v1/reports/class",
    params(ReportQuery),
    responses(
        (status = 200, description = "One row per period bucket", body = [ReportRow]),
        (status = 400, description = "Invalid query"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
#[instrument(
    name = "class_report",
    skip_all,
    fields(period = %query.period, class = ?query.class)
)]
pub async fn class_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require(Capability::ViewReports)?;

    let filter = query.base_filter()?.with_class(query.class.as_deref());
    respond(pool.get_ref(), &config, filter).await
}

/// Section-wise attendance
#[utoipa::path(
    get,
    path = "/api/v1/reports/section",
    params(ReportQuery),
    responses(
        (status = 200, description = "One row per period bucket", body = [ReportRow]),
        (status = 400, description = "Invalid query"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
#[instrument(
    name = "section_report",
    skip_all,
    fields(period = %query.period, class = ?query.class, section = ?query.section)
)]
pub async fn section_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require(Capability::ViewReports)?;

    let filter = query
        .base_filter()?
        .with_class(query.class.as_deref())
        .with_section(query.section.as_deref());
    respond(pool.get_ref(), &config, filter).await
}

/// Attendance of a single student
#[utoipa::path(
    get,
    path = "/api/v1/reports/student/{student_id}",
    params(
        ("student_id" = u64, Path, description = "Student ID"),
        ReportQuery
    ),
    responses(
        (status = 200, description = "One row per period bucket, empty when the student has no records", body = [ReportRow]),
        (status = 400, description = "Invalid query"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
#[instrument(
    name = "student_report",
    skip_all,
    fields(period = %query.period, student_id = *path)
)]
pub async fn student_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require(Capability::ViewReports)?;

    let filter = query.base_filter()?.for_student(path.into_inner());
    respond(pool.get_ref(), &config, filter).await
}
