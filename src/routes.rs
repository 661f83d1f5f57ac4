use crate::{
    api::{attendance, health, report, student},
    auth::middleware::auth_middleware,
    config::Config,
    error::AppError,
    response::ApiResponse,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{HttpResponse, middleware::from_fn, web};
use anyhow::{Context, Result};

type IpLimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiter state, built once so every worker shares the same quota.
#[derive(Clone)]
pub struct Limiters {
    protected: IpLimiterConfig,
    reports: IpLimiterConfig,
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            protected: build_limiter(config.rate_protected_per_min)
                .context("invalid RATE_PROTECTED_PER_MIN")?,
            reports: build_limiter(config.rate_report_per_min)
                .context("invalid RATE_REPORT_PER_MIN")?,
        })
    }
}

fn build_limiter(requests_per_min: u32) -> Option<IpLimiterConfig> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);

    GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
}

// Extractor failures become 400 envelopes instead of actix's plain-text bodies
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::validation(err.to_string()).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::validation(err.to_string()).into())
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| AppError::validation(err.to_string()).into())
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ApiResponse::failure("Route not found"))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config());

    // Public routes
    cfg.service(health::health);

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(Governor::new(&limiters.protected))
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::get_attendance_by_date))
                            .route(web::post().to(attendance::record_attendance)),
                    )
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}").route(web::put().to(attendance::update_attendance)),
                    ),
            )
            .service(
                web::scope("/students")
                    // /students
                    .service(
                        web::resource("")
                            .route(web::post().to(student::create_student))
                            .route(web::get().to(student::list_students)),
                    )
                    // /students/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(student::get_student))
                            .route(web::put().to(student::update_student))
                            .route(web::delete().to(student::deactivate_student)),
                    ),
            )
            .service(
                web::scope("/reports")
                    .wrap(Governor::new(&limiters.reports))
                    .route("/school", web::get().to(report::school_report))
                    .route("/class", web::get().to(report::class_report))
                    .route("/section", web::get().to(report::section_report))
                    .route("/student/{id}", web::get().to(report::student_report)),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_still_builds_a_limiter() {
        assert!(build_limiter(0).is_some());
        assert!(build_limiter(120_000).is_some());
    }
}
