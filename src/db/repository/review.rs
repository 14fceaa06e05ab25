use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

pub struct ReviewRepository;

impl ReviewRepository {
    /// Create the user's review of a course or overwrite the existing one.
    pub async fn upsert(
        pool: &SqlitePool,
        course_id: &str,
        user_id: &str,
        enrollment_id: &str,
        rating: i64,
        comment: &str,
        now: NaiveDateTime,
    ) -> AppResult<CourseReview> {
        sqlx::query_as::<_, CourseReview>(
            r#"
            INSERT INTO course_reviews (
                id, course_id, user_id, enrollment_id, rating, comment, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(course_id, user_id) DO UPDATE SET
                enrollment_id = excluded.enrollment_id,
                rating = excluded.rating,
                comment = excluded.comment,
                updated_at = excluded.updated_at
            RETURNING id, course_id, user_id, enrollment_id, rating, comment, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(course_id)
        .bind(user_id)
        .bind(enrollment_id)
        .bind(rating)
        .bind(comment)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, course_id: &str, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM course_reviews WHERE course_id = ? AND user_id = ?")
            .bind(course_id)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_for_course(
        pool: &SqlitePool,
        course_id: &str,
    ) -> AppResult<Vec<CourseReviewWithAuthor>> {
        sqlx::query_as::<_, CourseReviewWithAuthor>(
            r#"
            SELECT
                r.id, r.course_id, r.user_id, u.username,
                r.rating, r.comment, r.created_at, r.updated_at
            FROM course_reviews r
            JOIN users u ON u.id = r.user_id
            WHERE r.course_id = ?
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(course_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn rating_summary(pool: &SqlitePool, course_id: &str) -> AppResult<RatingSummary> {
        let (average, total): (Option<f64>, i64) = sqlx::query_as(
            "SELECT AVG(rating), COUNT(*) FROM course_reviews WHERE course_id = ?",
        )
        .bind(course_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(RatingSummary {
            average: average.map(|a| (a * 10.0).round() / 10.0).unwrap_or(0.0),
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::course::tests::sample_course;
    use crate::db::repository::enrollment::tests::seed_user;
    use crate::db::testing::memory_pool;
    use crate::db::{CourseRepository, EnrollmentRepository};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn upsert_keeps_one_review_per_user_and_course() {
        let pool = memory_pool().await;
        let course = CourseRepository::create(&pool, sample_course("IELTS")).await.unwrap();
        let now = NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let later = now + chrono::Duration::minutes(5);

        let mut ratings = Vec::new();
        for (name, rating) in [("asha", 5), ("bikash", 4), ("chandra", 4)] {
            let user = seed_user(&pool, name).await;
            let enrollment =
                EnrollmentRepository::create_pending(&pool, &user.id, &course.id, 1, now)
                    .await
                    .unwrap();
            ReviewRepository::upsert(&pool, &course.id, &user.id, &enrollment.id, 1, "", now)
                .await
                .unwrap();
            let review =
                ReviewRepository::upsert(&pool, &course.id, &user.id, &enrollment.id, rating, "ok", later)
                    .await
                    .unwrap();
            assert_eq!(review.created_at, now);
            assert_eq!(review.updated_at, later);
            ratings.push(review);
        }

        let summary = ReviewRepository::rating_summary(&pool, &course.id).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.average, 4.3);

        let listed = ReviewRepository::list_for_course(&pool, &course.id).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.iter().all(|r| r.comment == "ok"));

        assert!(ReviewRepository::delete(&pool, &course.id, &ratings[0].user_id)
            .await
            .unwrap());
        assert!(!ReviewRepository::delete(&pool, &course.id, &ratings[0].user_id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn summary_of_unreviewed_course_is_zero() {
        let pool = memory_pool().await;
        let course = CourseRepository::create(&pool, sample_course("IELTS")).await.unwrap();
        let summary = ReviewRepository::rating_summary(&pool, &course.id).await.unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.average, 0.0);
    }
}
