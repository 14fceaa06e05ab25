use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentMethod {
    Esewa,
    Khalti,
    Manual,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Esewa => "esewa",
            PaymentMethod::Khalti => "khalti",
            PaymentMethod::Manual => "manual",
        }
    }

    /// Convert from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "esewa" => Some(PaymentMethod::Esewa),
            "khalti" => Some(PaymentMethod::Khalti),
            "manual" => Some(PaymentMethod::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CourseEnrollment {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub amount_paid_cents: i64,
    pub transaction_id: Option<String>,
    pub enrolled_at: NaiveDateTime,
    pub payment_date: Option<NaiveDateTime>,
    pub access_expiry: Option<NaiveDateTime>,
    pub is_active: bool,
    pub notified_10min: bool,
    pub last_notification_date: Option<NaiveDate>,
}

impl CourseEnrollment {
    /// Access is granted by an active, paid enrollment that has not expired.
    /// `now` is UTC, like every stored timestamp.
    pub fn has_access(&self, now: NaiveDateTime) -> bool {
        if !self.is_active || self.payment_status != PaymentStatus::Completed {
            return false;
        }
        match self.access_expiry {
            Some(expiry) => now <= expiry,
            None => true,
        }
    }

    /// Whether a "starting soon" notice was already sent on `today`.
    pub fn notified_on(&self, today: NaiveDate) -> bool {
        self.notified_10min && self.last_notification_date == Some(today)
    }
}

/// Fields written when a pending enrollment is paid.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub payment_method: PaymentMethod,
    pub transaction_id: String,
    pub payment_date: NaiveDateTime,
    pub access_expiry: NaiveDateTime,
}
