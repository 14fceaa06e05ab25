use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Audit row for a course payment event. Rows are only ever inserted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CoursePaymentLog {
    pub id: String,
    pub enrollment_id: String,
    pub transaction_id: String,
    pub amount_cents: i64,
    pub payment_method: String,
    pub status: String,
    /// Raw JSON payload recorded with the event.
    pub response_data: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Audit row for an application fee payment event. Rows are only ever inserted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApplicationPaymentLog {
    pub id: String,
    pub application_id: String,
    pub transaction_id: String,
    pub amount_cents: i64,
    pub payment_method: String,
    pub status: String,
    pub response_data: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Shared insert payload for both payment log tables.
#[derive(Debug, Clone)]
pub struct CreatePaymentLog {
    pub parent_id: String,
    pub transaction_id: String,
    pub amount_cents: i64,
    pub payment_method: String,
    pub status: String,
    pub response_data: serde_json::Value,
}
