use chrono::NaiveDateTime;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::db::{CourseRepository, CourseReview, EnrollmentRepository, PaymentStatus, ReviewRepository};
use crate::error::{AppError, AppErrorWithDetails, AppResult, FieldErrors};
use crate::i18n::t;

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

pub struct ReviewService;

impl ReviewService {
    /// Create or replace the caller's review. Requires a completed enrollment.
    pub async fn submit(
        pool: &SqlitePool,
        user_id: &str,
        course_id: &str,
        request: ReviewRequest,
        now: NaiveDateTime,
    ) -> Result<CourseReview, AppErrorWithDetails> {
        CourseRepository::find_active_by_id(pool, course_id)
            .await?
            .ok_or_else(|| AppError::NotFound(t("not_found.course")))?;

        let mut errors = FieldErrors::new();
        if !(1..=5).contains(&request.rating) {
            errors.add("rating", t("validation.rating_range"));
        }
        errors.into_result()?;

        let enrollment = EnrollmentRepository::find_by_user_and_course(pool, user_id, course_id)
            .await?
            .filter(|e| e.payment_status == PaymentStatus::Completed)
            .ok_or_else(|| AppError::Forbidden.with_details(serde_json::json!({
                "reason": t("review.requires_enrollment"),
            })))?;

        let review = ReviewRepository::upsert(
            pool,
            course_id,
            user_id,
            &enrollment.id,
            request.rating,
            request.comment.trim(),
            now,
        )
        .await?;

        tracing::info!("User {} reviewed course {} ({}/5)", user_id, course_id, review.rating);
        Ok(review)
    }

    pub async fn delete(pool: &SqlitePool, user_id: &str, course_id: &str) -> AppResult<()> {
        if ReviewRepository::delete(pool, course_id, user_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(t("not_found.review")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::course::tests::sample_course;
    use crate::db::repository::enrollment::tests::seed_user;
    use crate::db::testing::memory_pool;
    use crate::services::enrollment::{ConfirmPayment, EnrollmentService};
    use chrono::Utc;

    #[tokio::test]
    async fn review_requires_completed_enrollment() {
        let pool = memory_pool().await;
        let user = seed_user(&pool, "asha").await;
        let course = CourseRepository::create(&pool, sample_course("IELTS")).await.unwrap();
        let now = Utc::now().naive_utc();

        let request = ReviewRequest {
            rating: 5,
            comment: "Great".to_string(),
        };
        assert!(ReviewService::submit(&pool, &user.id, &course.id, request.clone(), now)
            .await
            .is_err());

        let (_, pending, _) = EnrollmentService::initiate(&pool, &user.id, &course.id, now)
            .await
            .unwrap();
        assert!(ReviewService::submit(&pool, &user.id, &course.id, request.clone(), now)
            .await
            .is_err());

        EnrollmentService::confirm(&pool, &user.id, &pending.id, ConfirmPayment::default(), now, 365)
            .await
            .unwrap();
        let review = ReviewService::submit(&pool, &user.id, &course.id, request, now)
            .await
            .unwrap();
        assert_eq!(review.enrollment_id, pending.id);
        assert_eq!(review.comment, "Great");

        let out_of_range = ReviewRequest {
            rating: 6,
            comment: String::new(),
        };
        assert!(ReviewService::submit(&pool, &user.id, &course.id, out_of_range, now)
            .await
            .is_err());

        ReviewService::delete(&pool, &user.id, &course.id).await.unwrap();
        assert!(matches!(
            ReviewService::delete(&pool, &user.id, &course.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
