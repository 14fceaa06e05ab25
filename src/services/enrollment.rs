//! Enrollment lifecycle: pending -> completed | failed, completed -> refunded.
//!
//! Every payment event writes a row to `course_payment_logs` inside the same
//! transaction as the status change.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::{
    Course, CourseEnrollment, CourseRepository, CreatePaymentLog, EnrollmentRepository,
    PaymentConfirmation, PaymentLogRepository, PaymentMethod, PaymentStatus,
};
use crate::error::{AppError, AppResult};
use crate::i18n::t;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiateOutcome {
    Created,
    PendingExisting,
    Reopened,
    AlreadyEnrolled,
}

impl InitiateOutcome {
    pub fn message_key(self) -> &'static str {
        match self {
            InitiateOutcome::Created => "enrollment.pending_created",
            InitiateOutcome::PendingExisting => "enrollment.pending_existing",
            InitiateOutcome::Reopened => "enrollment.resubmitted",
            InitiateOutcome::AlreadyEnrolled => "enrollment.already_enrolled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmOutcome {
    Confirmed,
    AlreadyCompleted,
}

/// Optional overrides sent with a confirmation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmPayment {
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
}

/// `MANUAL_{id}_{YYYYmmddHHMMSS}`
pub fn manual_transaction_id(id: &str, now: NaiveDateTime) -> String {
    format!("MANUAL_{}_{}", id, now.format("%Y%m%d%H%M%S"))
}

pub struct EnrollmentService;

impl EnrollmentService {
    /// Start (or resume) an enrollment of `user_id` in an active course.
    pub async fn initiate(
        pool: &SqlitePool,
        user_id: &str,
        course_id: &str,
        now: NaiveDateTime,
    ) -> AppResult<(Course, CourseEnrollment, InitiateOutcome)> {
        let course = CourseRepository::find_active_by_id(pool, course_id)
            .await?
            .ok_or_else(|| AppError::NotFound(t("not_found.course")))?;
        let amount = course.discounted_price_cents();

        if let Some(existing) =
            EnrollmentRepository::find_by_user_and_course(pool, user_id, course_id).await?
        {
            let (enrollment, outcome) = Self::resume(pool, existing, amount).await?;
            return Ok((course, enrollment, outcome));
        }

        match EnrollmentRepository::create_pending(pool, user_id, course_id, amount, now).await {
            Ok(enrollment) => {
                tracing::info!(
                    "Created pending enrollment {} for user {} in course {}",
                    enrollment.id,
                    user_id,
                    course_id
                );
                Ok((course, enrollment, InitiateOutcome::Created))
            }
            Err(e) if e.is_unique_violation() => {
                tracing::debug!("Concurrent enrollment for user {} in {}", user_id, course_id);
                let existing = EnrollmentRepository::find_by_user_and_course(pool, user_id, course_id)
                    .await?
                    .ok_or(e)?;
                let (enrollment, outcome) = Self::resume(pool, existing, amount).await?;
                Ok((course, enrollment, outcome))
            }
            Err(e) => Err(e),
        }
    }

    async fn resume(
        pool: &SqlitePool,
        existing: CourseEnrollment,
        amount: i64,
    ) -> AppResult<(CourseEnrollment, InitiateOutcome)> {
        match existing.payment_status {
            PaymentStatus::Completed => Ok((existing, InitiateOutcome::AlreadyEnrolled)),
            PaymentStatus::Pending => Ok((existing, InitiateOutcome::PendingExisting)),
            PaymentStatus::Refunded => Err(AppError::Conflict(t("enrollment.refunded_conflict"))),
            PaymentStatus::Failed => {
                match EnrollmentRepository::reopen_failed(pool, &existing.id, amount).await? {
                    Some(reopened) => {
                        tracing::info!("Reopened failed enrollment {}", reopened.id);
                        Ok((reopened, InitiateOutcome::Reopened))
                    }
                    // someone else already reopened it
                    None => Ok((existing, InitiateOutcome::PendingExisting)),
                }
            }
        }
    }

    /// Confirm payment of the caller's pending enrollment.
    pub async fn confirm(
        pool: &SqlitePool,
        user_id: &str,
        enrollment_id: &str,
        request: ConfirmPayment,
        now: NaiveDateTime,
        access_days: i64,
    ) -> AppResult<(CourseEnrollment, ConfirmOutcome)> {
        let enrollment = EnrollmentRepository::find_for_user(pool, enrollment_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(t("not_found.enrollment")))?;

        match enrollment.payment_status {
            PaymentStatus::Completed => return Ok((enrollment, ConfirmOutcome::AlreadyCompleted)),
            PaymentStatus::Failed | PaymentStatus::Refunded => {
                return Err(AppError::Conflict(t("enrollment.not_pending")))
            }
            PaymentStatus::Pending => {}
        }

        let payment_method = match request.payment_method.as_deref() {
            None => PaymentMethod::Manual,
            Some(raw) => PaymentMethod::parse(raw).ok_or_else(|| {
                AppError::Validation(crate::i18n::t_with(
                    "validation.unknown_payment_method",
                    &[("method", raw)],
                ))
            })?,
        };
        let transaction_id = request
            .transaction_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| manual_transaction_id(&enrollment.id, now));

        let confirmation = PaymentConfirmation {
            payment_method,
            transaction_id,
            payment_date: now,
            access_expiry: now + Duration::days(access_days),
        };

        let mut tx = pool.begin().await?;

        let Some(confirmed) =
            EnrollmentRepository::confirm_payment(&mut tx, &enrollment.id, &confirmation).await?
        else {
            tx.rollback().await?;
            // Lost a race with another confirmation; report what it left behind.
            let current = EnrollmentRepository::find_for_user(pool, enrollment_id, user_id)
                .await?
                .ok_or_else(|| AppError::NotFound(t("not_found.enrollment")))?;
            return match current.payment_status {
                PaymentStatus::Completed => Ok((current, ConfirmOutcome::AlreadyCompleted)),
                _ => Err(AppError::Conflict(t("enrollment.not_pending"))),
            };
        };

        PaymentLogRepository::create_for_enrollment(
            &mut tx,
            CreatePaymentLog {
                parent_id: confirmed.id.clone(),
                transaction_id: confirmation.transaction_id.clone(),
                amount_cents: confirmed.amount_paid_cents,
                payment_method: payment_method.as_str().to_string(),
                status: PaymentStatus::Completed.as_str().to_string(),
                response_data: serde_json::json!({ "note": "Payment confirmed" }),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Enrollment {} confirmed via {} ({})",
            confirmed.id,
            payment_method.as_str(),
            confirmation.transaction_id
        );
        Ok((confirmed, ConfirmOutcome::Confirmed))
    }

    /// Staff action: pending -> failed.
    pub async fn mark_failed(
        pool: &SqlitePool,
        enrollment_id: &str,
        now: NaiveDateTime,
    ) -> AppResult<CourseEnrollment> {
        Self::staff_transition(
            pool,
            enrollment_id,
            PaymentStatus::Pending,
            PaymentStatus::Failed,
            "Payment marked as failed",
            "enrollment.not_pending",
            now,
        )
        .await
    }

    /// Staff action: completed -> refunded.
    pub async fn refund(
        pool: &SqlitePool,
        enrollment_id: &str,
        now: NaiveDateTime,
    ) -> AppResult<CourseEnrollment> {
        Self::staff_transition(
            pool,
            enrollment_id,
            PaymentStatus::Completed,
            PaymentStatus::Refunded,
            "Payment refunded",
            "enrollment.not_completed",
            now,
        )
        .await
    }

    async fn staff_transition(
        pool: &SqlitePool,
        enrollment_id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
        note: &str,
        conflict_key: &str,
        now: NaiveDateTime,
    ) -> AppResult<CourseEnrollment> {
        let mut tx = pool.begin().await?;

        let Some(updated) = EnrollmentRepository::transition(&mut tx, enrollment_id, from, to).await?
        else {
            tx.rollback().await?;
            return match EnrollmentRepository::find_by_id(pool, enrollment_id).await? {
                Some(_) => Err(AppError::Conflict(t(conflict_key))),
                None => Err(AppError::NotFound(t("not_found.enrollment"))),
            };
        };

        let transaction_id = updated
            .transaction_id
            .clone()
            .unwrap_or_else(|| manual_transaction_id(&updated.id, now));
        let method = updated.payment_method.unwrap_or(PaymentMethod::Manual);

        PaymentLogRepository::create_for_enrollment(
            &mut tx,
            CreatePaymentLog {
                parent_id: updated.id.clone(),
                transaction_id,
                amount_cents: updated.amount_paid_cents,
                payment_method: method.as_str().to_string(),
                status: to.as_str().to_string(),
                response_data: serde_json::json!({ "note": note }),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Enrollment {} moved from {} to {}",
            updated.id,
            from.as_str(),
            to.as_str()
        );
        Ok(updated)
    }
}
