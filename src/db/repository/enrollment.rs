use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Enrollment Repository
// ============================================================================

const ENROLLMENT_COLUMNS: &str = r#"
    id, user_id, course_id, payment_status, payment_method,
    amount_paid_cents, transaction_id, enrolled_at, payment_date,
    access_expiry, is_active, notified_10min, last_notification_date
"#;

pub struct EnrollmentRepository;

impl EnrollmentRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<CourseEnrollment>> {
        let sql = format!(
            "SELECT {} FROM course_enrollments WHERE id = ?",
            ENROLLMENT_COLUMNS
        );
        sqlx::query_as::<_, CourseEnrollment>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Lookup restricted to the owner; foreign ids behave like missing ones.
    pub async fn find_for_user(
        pool: &SqlitePool,
        id: &str,
        user_id: &str,
    ) -> AppResult<Option<CourseEnrollment>> {
        let sql = format!(
            "SELECT {} FROM course_enrollments WHERE id = ? AND user_id = ?",
            ENROLLMENT_COLUMNS
        );
        sqlx::query_as::<_, CourseEnrollment>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_by_user_and_course(
        pool: &SqlitePool,
        user_id: &str,
        course_id: &str,
    ) -> AppResult<Option<CourseEnrollment>> {
        let sql = format!(
            "SELECT {} FROM course_enrollments WHERE user_id = ? AND course_id = ?",
            ENROLLMENT_COLUMNS
        );
        sqlx::query_as::<_, CourseEnrollment>(&sql)
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_completed_for_user(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Vec<CourseEnrollment>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM course_enrollments
            WHERE user_id = ? AND payment_status = 'completed'
            ORDER BY enrolled_at DESC
            "#,
            ENROLLMENT_COLUMNS
        );
        sqlx::query_as::<_, CourseEnrollment>(&sql)
            .bind(user_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_all(pool: &SqlitePool) -> AppResult<Vec<CourseEnrollment>> {
        let sql = format!(
            "SELECT {} FROM course_enrollments ORDER BY enrolled_at DESC",
            ENROLLMENT_COLUMNS
        );
        sqlx::query_as::<_, CourseEnrollment>(&sql)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Insert a pending enrollment. A racing duplicate surfaces as a unique violation.
    pub async fn create_pending(
        pool: &SqlitePool,
        user_id: &str,
        course_id: &str,
        amount_cents: i64,
        now: NaiveDateTime,
    ) -> AppResult<CourseEnrollment> {
        let sql = format!(
            r#"
            INSERT INTO course_enrollments (
                id, user_id, course_id, payment_status,
                amount_paid_cents, enrolled_at, is_active
            )
            VALUES (?, ?, ?, 'pending', ?, ?, 1)
            RETURNING {}
            "#,
            ENROLLMENT_COLUMNS
        );
        sqlx::query_as::<_, CourseEnrollment>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(user_id)
            .bind(course_id)
            .bind(amount_cents)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Move a failed enrollment back to pending at the current price.
    pub async fn reopen_failed(
        pool: &SqlitePool,
        id: &str,
        amount_cents: i64,
    ) -> AppResult<Option<CourseEnrollment>> {
        let sql = format!(
            r#"
            UPDATE course_enrollments
            SET
                payment_status = 'pending',
                amount_paid_cents = ?,
                payment_method = NULL,
                transaction_id = NULL,
                payment_date = NULL,
                access_expiry = NULL
            WHERE id = ? AND payment_status = 'failed'
            RETURNING {}
            "#,
            ENROLLMENT_COLUMNS
        );
        sqlx::query_as::<_, CourseEnrollment>(&sql)
            .bind(amount_cents)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Mark a pending enrollment paid. `None` when it was no longer pending.
    pub async fn confirm_payment(
        conn: &mut SqliteConnection,
        id: &str,
        confirmation: &PaymentConfirmation,
    ) -> AppResult<Option<CourseEnrollment>> {
        let sql = format!(
            r#"
            UPDATE course_enrollments
            SET
                payment_status = 'completed',
                payment_method = ?,
                transaction_id = ?,
                payment_date = ?,
                access_expiry = ?,
                notified_10min = 0,
                last_notification_date = NULL
            WHERE id = ? AND payment_status = 'pending'
            RETURNING {}
            "#,
            ENROLLMENT_COLUMNS
        );
        sqlx::query_as::<_, CourseEnrollment>(&sql)
            .bind(confirmation.payment_method)
            .bind(&confirmation.transaction_id)
            .bind(confirmation.payment_date)
            .bind(confirmation.access_expiry)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(AppError::Database)
    }

    /// Compare-and-set on payment_status. `None` when the row was not in `from`.
    pub async fn transition(
        conn: &mut SqliteConnection,
        id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> AppResult<Option<CourseEnrollment>> {
        let sql = format!(
            r#"
            UPDATE course_enrollments
            SET payment_status = ?
            WHERE id = ? AND payment_status = ?
            RETURNING {}
            "#,
            ENROLLMENT_COLUMNS
        );
        sqlx::query_as::<_, CourseEnrollment>(&sql)
            .bind(to)
            .bind(id)
            .bind(from)
            .fetch_optional(&mut *conn)
            .await
            .map_err(AppError::Database)
    }

    /// Atomically take the "starting soon" slot for `today`.
    ///
    /// Returns true for exactly one caller per enrollment and day.
    pub async fn claim_notification(
        pool: &SqlitePool,
        id: &str,
        today: NaiveDate,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE course_enrollments
            SET
                notified_10min = 1,
                last_notification_date = ?
            WHERE id = ?
              AND (notified_10min = 0
                   OR last_notification_date IS NULL
                   OR last_notification_date <> ?)
            "#,
        )
        .bind(today)
        .bind(id)
        .bind(today)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Clear notification flags for the given enrollments, or for all when `ids` is empty.
    pub async fn reset_notifications(pool: &SqlitePool, ids: &[String]) -> AppResult<u64> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "UPDATE course_enrollments SET notified_10min = 0, last_notification_date = NULL",
        );
        if !ids.is_empty() {
            qb.push(" WHERE id IN (");
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");
        }

        let result = qb.build().execute(pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }

    /// Whether the user holds a paid, unexpired enrollment in any live course.
    pub async fn has_active_live_enrollment(
        pool: &SqlitePool,
        user_id: &str,
        now: NaiveDateTime,
    ) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM course_enrollments e
            JOIN courses c ON c.id = e.course_id
            WHERE e.user_id = ?
              AND e.payment_status = 'completed'
              AND e.is_active = 1
              AND (e.access_expiry IS NULL OR e.access_expiry >= ?)
              AND c.course_type = 'live'
              AND c.is_active = 1
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;
        Ok(count > 0)
    }
}
