use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Course Repository
// ============================================================================

const COURSE_COLUMNS: &str = r#"
    id, title, description, image_path, course_type,
    price_cents, discount_basis_points,
    schedule_days, start_time, end_time, schedule_time,
    session_details, duration, instructor_name,
    is_active, created_at, updated_at
"#;

pub struct CourseRepository;

impl CourseRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Course>> {
        let sql = format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS);
        sqlx::query_as::<_, Course>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Inactive courses are invisible to students.
    pub async fn find_active_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Course>> {
        let sql = format!(
            "SELECT {} FROM courses WHERE id = ? AND is_active = 1",
            COURSE_COLUMNS
        );
        sqlx::query_as::<_, Course>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Active courses, newest first, narrowed by type and a free-text query.
    pub async fn list_active(pool: &SqlitePool, filter: &CourseFilter) -> AppResult<Vec<Course>> {
        let pattern = filter
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", q));
        let course_type = filter.course_type.map(CourseType::as_str);

        let sql = format!(
            r#"
            SELECT {}
            FROM courses
            WHERE is_active = 1
              AND (?1 IS NULL OR course_type = ?1)
              AND (?2 IS NULL
                   OR title LIKE ?2
                   OR description LIKE ?2
                   OR instructor_name LIKE ?2)
            ORDER BY created_at DESC
            "#,
            COURSE_COLUMNS
        );
        sqlx::query_as::<_, Course>(&sql)
            .bind(course_type)
            .bind(pattern)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Every course including inactive ones, for staff.
    pub async fn list_all(pool: &SqlitePool) -> AppResult<Vec<Course>> {
        let sql = format!(
            "SELECT {} FROM courses ORDER BY created_at DESC",
            COURSE_COLUMNS
        );
        sqlx::query_as::<_, Course>(&sql)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn create(pool: &SqlitePool, course: CreateCourse) -> AppResult<Course> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let sql = format!(
            r#"
            INSERT INTO courses (
                id, title, description, image_path, course_type,
                price_cents, discount_basis_points,
                schedule_days, start_time, end_time, schedule_time,
                session_details, duration, instructor_name,
                is_active, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            COURSE_COLUMNS
        );

        sqlx::query_as::<_, Course>(&sql)
            .bind(&id)
            .bind(&course.title)
            .bind(&course.description)
            .bind(&course.image_path)
            .bind(course.course_type)
            .bind(course.price_cents)
            .bind(course.discount_basis_points)
            .bind(course.schedule_days.to_json())
            .bind(course.start_time)
            .bind(course.end_time)
            .bind(&course.schedule_time)
            .bind(&course.session_details)
            .bind(&course.duration)
            .bind(&course.instructor_name)
            .bind(course.is_active)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Replace every editable field of a course.
    pub async fn update(pool: &SqlitePool, id: &str, course: CreateCourse) -> AppResult<Option<Course>> {
        let now = Utc::now().naive_utc();

        let sql = format!(
            r#"
            UPDATE courses
            SET
                title = ?,
                description = ?,
                image_path = ?,
                course_type = ?,
                price_cents = ?,
                discount_basis_points = ?,
                schedule_days = ?,
                start_time = ?,
                end_time = ?,
                schedule_time = ?,
                session_details = ?,
                duration = ?,
                instructor_name = ?,
                is_active = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING {}
            "#,
            COURSE_COLUMNS
        );

        sqlx::query_as::<_, Course>(&sql)
            .bind(&course.title)
            .bind(&course.description)
            .bind(&course.image_path)
            .bind(course.course_type)
            .bind(course.price_cents)
            .bind(course.discount_basis_points)
            .bind(course.schedule_days.to_json())
            .bind(course.start_time)
            .bind(course.end_time)
            .bind(&course.schedule_time)
            .bind(&course.session_details)
            .bind(&course.duration)
            .bind(&course.instructor_name)
            .bind(course.is_active)
            .bind(now)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Bulk activate or deactivate. Returns the number of rows touched.
    pub async fn set_active(pool: &SqlitePool, ids: &[String], active: bool) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let now = Utc::now().naive_utc();

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE courses SET is_active = ");
        qb.push_bind(active);
        qb.push(", updated_at = ");
        qb.push_bind(now);
        qb.push(" WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let result = qb.build().execute(pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }
}
