use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

const APPLICATION_COLUMNS: &str = r#"
    id, vacancy_id, full_name, email, phone, cv_path,
    payment_status, payment_amount_cents, payment_method, transaction_id,
    status, applied_at, updated_at
"#;

pub struct ApplicationRepository;

impl ApplicationRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<VacancyApplication>> {
        let sql = format!(
            "SELECT {} FROM vacancy_applications WHERE id = ?",
            APPLICATION_COLUMNS
        );
        sqlx::query_as::<_, VacancyApplication>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_by_vacancy_and_email(
        pool: &SqlitePool,
        vacancy_id: &str,
        email: &str,
    ) -> AppResult<Option<VacancyApplication>> {
        let sql = format!(
            "SELECT {} FROM vacancy_applications WHERE vacancy_id = ? AND email = ?",
            APPLICATION_COLUMNS
        );
        sqlx::query_as::<_, VacancyApplication>(&sql)
            .bind(vacancy_id)
            .bind(email)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_by_email(pool: &SqlitePool, email: &str) -> AppResult<Vec<VacancyApplication>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM vacancy_applications
            WHERE LOWER(email) = LOWER(?)
            ORDER BY applied_at DESC
            "#,
            APPLICATION_COLUMNS
        );
        sqlx::query_as::<_, VacancyApplication>(&sql)
            .bind(email)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_for_vacancy(
        pool: &SqlitePool,
        vacancy_id: &str,
    ) -> AppResult<Vec<VacancyApplication>> {
        let sql = format!(
            "SELECT {} FROM vacancy_applications WHERE vacancy_id = ? ORDER BY applied_at DESC",
            APPLICATION_COLUMNS
        );
        sqlx::query_as::<_, VacancyApplication>(&sql)
            .bind(vacancy_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Insert a pending application. A racing duplicate surfaces as a unique violation.
    pub async fn create(
        pool: &SqlitePool,
        application: CreateApplication,
    ) -> AppResult<VacancyApplication> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            INSERT INTO vacancy_applications (
                id, vacancy_id, full_name, email, phone, cv_path,
                payment_status, payment_amount_cents, status, applied_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, 'submitted', ?, ?)
            RETURNING {}
            "#,
            APPLICATION_COLUMNS
        );
        sqlx::query_as::<_, VacancyApplication>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&application.vacancy_id)
            .bind(&application.full_name)
            .bind(&application.email)
            .bind(&application.phone)
            .bind(&application.cv_path)
            .bind(application.payment_amount_cents)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Mark the fee of a pending application paid. `None` when it was no longer pending.
    pub async fn confirm_payment(
        conn: &mut SqliteConnection,
        id: &str,
        payment_method: &str,
        transaction_id: &str,
    ) -> AppResult<Option<VacancyApplication>> {
        let sql = format!(
            r#"
            UPDATE vacancy_applications
            SET
                payment_status = 'completed',
                payment_method = ?,
                transaction_id = ?,
                updated_at = ?
            WHERE id = ? AND payment_status = 'pending'
            RETURNING {}
            "#,
            APPLICATION_COLUMNS
        );
        sqlx::query_as::<_, VacancyApplication>(&sql)
            .bind(payment_method)
            .bind(transaction_id)
            .bind(Utc::now().naive_utc())
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(AppError::Database)
    }

    /// Move a pending fee to failed. `None` when it was no longer pending.
    pub async fn mark_failed(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> AppResult<Option<VacancyApplication>> {
        let sql = format!(
            r#"
            UPDATE vacancy_applications
            SET payment_status = 'failed', updated_at = ?
            WHERE id = ? AND payment_status = 'pending'
            RETURNING {}
            "#,
            APPLICATION_COLUMNS
        );
        sqlx::query_as::<_, VacancyApplication>(&sql)
            .bind(Utc::now().naive_utc())
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(AppError::Database)
    }

    /// Put a failed application back to pending with the resubmitted details.
    /// `None` when it was no longer failed.
    pub async fn reopen_failed(
        pool: &SqlitePool,
        id: &str,
        resubmission: &CreateApplication,
    ) -> AppResult<Option<VacancyApplication>> {
        let sql = format!(
            r#"
            UPDATE vacancy_applications
            SET
                full_name = ?,
                phone = ?,
                cv_path = ?,
                payment_status = 'pending',
                payment_amount_cents = ?,
                payment_method = NULL,
                transaction_id = NULL,
                status = 'submitted',
                updated_at = ?
            WHERE id = ? AND payment_status = 'failed'
            RETURNING {}
            "#,
            APPLICATION_COLUMNS
        );
        sqlx::query_as::<_, VacancyApplication>(&sql)
            .bind(&resubmission.full_name)
            .bind(&resubmission.phone)
            .bind(&resubmission.cv_path)
            .bind(resubmission.payment_amount_cents)
            .bind(Utc::now().naive_utc())
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn set_status(
        pool: &SqlitePool,
        id: &str,
        status: ApplicationStatus,
    ) -> AppResult<Option<VacancyApplication>> {
        let sql = format!(
            r#"
            UPDATE vacancy_applications
            SET status = ?, updated_at = ?
            WHERE id = ?
            RETURNING {}
            "#,
            APPLICATION_COLUMNS
        );
        sqlx::query_as::<_, VacancyApplication>(&sql)
            .bind(status)
            .bind(Utc::now().naive_utc())
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }
}
