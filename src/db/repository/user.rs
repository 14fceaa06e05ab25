use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Repository
// ============================================================================

pub struct UserRepository;

impl UserRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT
                id, username, email, first_name, last_name,
                password_hash, is_staff, lang,
                created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_username(pool: &SqlitePool, username: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT
                id, username, email, first_name, last_name,
                password_hash, is_staff, lang,
                created_at, updated_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Every account registered with `email` (case-insensitive).
    ///
    /// The schema keeps emails unique, so this returns at most one row for
    /// databases created by our migrations; login still tries each match.
    pub async fn find_all_by_email(pool: &SqlitePool, email: &str) -> AppResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT
                id, username, email, first_name, last_name,
                password_hash, is_staff, lang,
                created_at, updated_at
            FROM users
            WHERE LOWER(email) = LOWER(?)
            ORDER BY created_at ASC
            "#,
        )
        .bind(email)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn username_exists(pool: &SqlitePool, username: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)?;
        Ok(count > 0)
    }

    pub async fn email_exists(pool: &SqlitePool, email: &str) -> AppResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE LOWER(email) = LOWER(?)")
                .bind(email)
                .fetch_one(pool)
                .await
                .map_err(AppError::Database)?;
        Ok(count > 0)
    }

    /// Insert the account together with its profile row.
    pub async fn create_with_profile(
        pool: &SqlitePool,
        user: CreateUser,
        mobile_number: &str,
    ) -> AppResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let mut tx = pool.begin().await?;

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, username, email, first_name, last_name,
                password_hash, is_staff, lang,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id, username, email, first_name, last_name,
                password_hash, is_staff, lang,
                created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.is_staff)
        .bind(None::<String>)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        sqlx::query(
            r#"
            INSERT INTO user_profiles (id, user_id, mobile_number, address, created_at, updated_at)
            VALUES (?, ?, ?, '', ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&id)
        .bind(mobile_number)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        tx.commit().await?;

        Ok(created)
    }

    /// Grant staff rights and replace the password hash.
    pub async fn promote_to_staff(
        pool: &SqlitePool,
        user_id: &str,
        password_hash: &str,
    ) -> AppResult<Option<User>> {
        sqlx::query("UPDATE users SET is_staff = 1, password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now().naive_utc())
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
        Self::find_by_id(pool, user_id).await
    }

    pub async fn set_lang(pool: &SqlitePool, user_id: &str, lang: Option<&str>) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE users
            SET
                lang = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(lang)
        .bind(now)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::memory_pool;

    fn new_user(username: &str, email: &str) -> CreateUser {
        CreateUser {
            username: username.to_string(),
            email: email.to_string(),
            first_name: "Sita".to_string(),
            last_name: "Sharma".to_string(),
            password_hash: "hash".to_string(),
            is_staff: false,
        }
    }

    #[tokio::test]
    async fn create_with_profile_writes_both_rows() {
        let pool = memory_pool().await;
        let user = UserRepository::create_with_profile(
            &pool,
            new_user("sita", "sita@example.com"),
            "9800000000",
        )
        .await
        .unwrap();

        assert_eq!(user.full_name(), "Sita Sharma");
        assert!(UserRepository::username_exists(&pool, "sita").await.unwrap());
        assert!(UserRepository::email_exists(&pool, "SITA@example.com")
            .await
            .unwrap());

        let mobile: String =
            sqlx::query_scalar("SELECT mobile_number FROM user_profiles WHERE user_id = ?")
                .bind(&user.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(mobile, "9800000000");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_by_the_schema() {
        let pool = memory_pool().await;
        UserRepository::create_with_profile(&pool, new_user("a", "same@example.com"), "")
            .await
            .unwrap();
        let err = UserRepository::create_with_profile(&pool, new_user("b", "same@example.com"), "")
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        // the failed insert left no orphan profile behind
        let profiles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_profiles")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(profiles, 1);
    }
}
