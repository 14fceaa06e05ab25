//! Initialization helpers for the application:
//! - database connection + migrations
//! - media directory for uploaded CVs
//! - sample data for the `setup-vacancies` command

use std::path::Path;

use anyhow::Result;
use chrono::{Duration, Utc};

use crate::config::Config;
use crate::db::{CreateVacancy, EmploymentType, Vacancy, VacancyLevel, VacancyRepository, WorkMode};

/// Redact potentially sensitive information from a database URL before logging.
///
/// Attempts to parse the URL and remove userinfo (username:password) components.
/// Falls back to removing everything before '@' or returning "(redacted)".
pub fn redact_db_url(db_url: &str) -> String {
    if let Ok(url) = url::Url::parse(db_url) {
        let scheme = url.scheme();
        let host = url.host_str().unwrap_or("");
        let port_part = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
        let path = url.path();
        format!("{}://{}{}{}", scheme, host, port_part, path)
    } else {
        if let Some(at_pos) = db_url.find('@') {
            let without_creds = &db_url[at_pos + 1..];
            return format!("(redacted){}", without_creds);
        }
        "(redacted)".to_string()
    }
}

/// Initialize SQLite database connection and run migrations.
///
/// Creates the parent directory for the database file (if applicable),
/// opens a connection pool using `create_if_missing(true)` and runs migrations.
pub async fn init_db(config: &Config) -> Result<sqlx::SqlitePool> {
    let db_url = &config.database.url;
    tracing::info!("Connecting to database: {}", redact_db_url(db_url));

    let db_path = db_url.strip_prefix("sqlite://").unwrap_or(db_url);
    let db_file_path = Path::new(db_path);

    if let Some(parent) = db_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
        }
    }

    let connect_options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await?;

    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Make sure the media root exists so the first upload does not race on it.
pub async fn init_media(config: &Config) -> Result<()> {
    let root = Path::new(&config.media.root);
    tokio::fs::create_dir_all(root).await.map_err(|e| {
        anyhow::anyhow!("Failed to create media directory {}: {}", root.display(), e)
    })?;
    tracing::info!("Media root: {}", root.display());
    Ok(())
}

/// Insert the sample "Home Tuition Teacher" vacancy unless one already exists.
pub async fn seed_sample_vacancy(pool: &sqlx::SqlitePool) -> Result<(Vacancy, bool)> {
    const TITLE: &str = "Home Tuition Teacher";

    if let Some(existing) = VacancyRepository::find_by_title(pool, TITLE).await? {
        return Ok((existing, false));
    }

    let today = Utc::now().date_naive();
    let vacancy = VacancyRepository::create(
        pool,
        CreateVacancy {
            title: TITLE.to_string(),
            company_name: "CREATIVE EDUCATION FOUNDATION PVT. LTD".to_string(),
            employment_type: EmploymentType::PartTime,
            location: "Pokhara".to_string(),
            salary_cents: Some(1_000_000),
            level: VacancyLevel::Mid,
            mode: WorkMode::Hybrid,
            openings: 4,
            start_date: Some(today + Duration::days(10)),
            deadline: today + Duration::days(60),
            description: "We are looking for passionate teachers...".to_string(),
            requirements: "Bachelor degree\n1 year experience".to_string(),
            responsibilities: "Conduct tuition\nPrepare materials".to_string(),
            is_active: true,
        },
    )
    .await?;

    Ok((vacancy, true))
}
