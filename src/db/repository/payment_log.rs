use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Payment Log Repository
// ============================================================================
//
// Both log tables are insert-only. Rows disappear only through the parent's
// ON DELETE CASCADE.

pub struct PaymentLogRepository;

impl PaymentLogRepository {
    pub async fn create_for_enrollment(
        conn: &mut SqliteConnection,
        log: CreatePaymentLog,
    ) -> AppResult<CoursePaymentLog> {
        sqlx::query_as::<_, CoursePaymentLog>(
            r#"
            INSERT INTO course_payment_logs (
                id, enrollment_id, transaction_id, amount_cents,
                payment_method, status, response_data, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id, enrollment_id, transaction_id, amount_cents,
                payment_method, status, response_data, created_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&log.parent_id)
        .bind(&log.transaction_id)
        .bind(log.amount_cents)
        .bind(&log.payment_method)
        .bind(&log.status)
        .bind(log.response_data.to_string())
        .bind(Utc::now().naive_utc())
        .fetch_one(&mut *conn)
        .await
        .map_err(AppError::Database)
    }

    pub async fn create_for_application(
        conn: &mut SqliteConnection,
        log: CreatePaymentLog,
    ) -> AppResult<ApplicationPaymentLog> {
        sqlx::query_as::<_, ApplicationPaymentLog>(
            r#"
            INSERT INTO application_payment_logs (
                id, application_id, transaction_id, amount_cents,
                payment_method, status, response_data, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id, application_id, transaction_id, amount_cents,
                payment_method, status, response_data, created_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&log.parent_id)
        .bind(&log.transaction_id)
        .bind(log.amount_cents)
        .bind(&log.payment_method)
        .bind(&log.status)
        .bind(log.response_data.to_string())
        .bind(Utc::now().naive_utc())
        .fetch_one(&mut *conn)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_for_enrollment(
        pool: &SqlitePool,
        enrollment_id: &str,
    ) -> AppResult<Vec<CoursePaymentLog>> {
        sqlx::query_as::<_, CoursePaymentLog>(
            r#"
            SELECT
                id, enrollment_id, transaction_id, amount_cents,
                payment_method, status, response_data, created_at
            FROM course_payment_logs
            WHERE enrollment_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(enrollment_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Most recent course payment events across all enrollments.
    pub async fn list_recent_course_logs(
        pool: &SqlitePool,
        limit: i64,
    ) -> AppResult<Vec<CoursePaymentLog>> {
        sqlx::query_as::<_, CoursePaymentLog>(
            r#"
            SELECT
                id, enrollment_id, transaction_id, amount_cents,
                payment_method, status, response_data, created_at
            FROM course_payment_logs
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_for_application(
        pool: &SqlitePool,
        application_id: &str,
    ) -> AppResult<Vec<ApplicationPaymentLog>> {
        sqlx::query_as::<_, ApplicationPaymentLog>(
            r#"
            SELECT
                id, application_id, transaction_id, amount_cents,
                payment_method, status, response_data, created_at
            FROM application_payment_logs
            WHERE application_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(application_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
