use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CourseReview {
    pub id: String,
    pub course_id: String,
    pub user_id: String,
    pub enrollment_id: String,
    pub rating: i64,
    pub comment: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Review joined with the reviewer's display name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CourseReviewWithAuthor {
    pub id: String,
    pub course_id: String,
    pub user_id: String,
    pub username: String,
    pub rating: i64,
    pub comment: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RatingSummary {
    /// Mean rating rounded to one decimal, 0.0 without reviews.
    pub average: f64,
    pub total: i64,
}
