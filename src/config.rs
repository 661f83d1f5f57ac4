use std::{env, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveTime;
use dotenvy::dotenv;

use crate::report::lateness::LatenessPolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub api_prefix: String,

    // Database
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub query_timeout: Duration,
    pub run_migrations: bool,

    // Rate limiting
    pub rate_protected_per_min: u32,
    pub rate_report_per_min: u32,

    pub lateness_policy: LatenessPolicy,
    pub cors_allowed_origins: Vec<String>,

    pub log_dir: String,
    pub log_level: tracing::Level,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));

        let lateness_policy = match lookup("SCHOOL_START_TIME").filter(|v| !v.trim().is_empty()) {
            Some(raw) => {
                let start = NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                    .with_context(|| format!("SCHOOL_START_TIME must be HH:mm, got {raw:?}"))?;
                LatenessPolicy::SinceStart(start)
            }
            None => LatenessPolicy::MinuteOfHour,
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api/v1".to_string()),

            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            db_acquire_timeout: Duration::from_secs(parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 5)?),
            query_timeout: Duration::from_secs(parse_or(&lookup, "QUERY_TIMEOUT_SECS", 15)?),
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", true)?,

            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,
            rate_report_per_min: parse_or(&lookup, "RATE_REPORT_PER_MIN", 120)?,

            lateness_policy,
            cors_allowed_origins,

            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            log_level: parse_or(&lookup, "LOG_LEVEL", tracing::Level::INFO)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has an invalid value {raw:?}: {e}")),
        None => Ok(default),
    }
}
