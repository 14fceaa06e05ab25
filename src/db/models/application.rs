use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Fee payment state of an application. Applications have no refund path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ApplicationPaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// Review state set by staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    UnderReview,
    Shortlisted,
    Rejected,
    Accepted,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VacancyApplication {
    pub id: String,
    pub vacancy_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub cv_path: String,
    pub payment_status: ApplicationPaymentStatus,
    pub payment_amount_cents: i64,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub status: ApplicationStatus,
    pub applied_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl VacancyApplication {
    /// File name of the stored CV without its directory.
    pub fn cv_filename(&self) -> &str {
        self.cv_path.rsplit('/').next().unwrap_or(&self.cv_path)
    }
}

#[derive(Debug, Clone)]
pub struct CreateApplication {
    pub vacancy_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub cv_path: String,
    pub payment_amount_cents: i64,
}
