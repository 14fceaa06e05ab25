use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

pub struct ProfileRepository;

impl ProfileRepository {
    pub async fn find_by_user(pool: &SqlitePool, user_id: &str) -> AppResult<Option<UserProfile>> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, user_id, mobile_number, address, date_of_birth, created_at, updated_at
            FROM user_profiles
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Accounts created outside registration (staff seeding) may lack a profile row.
    pub async fn get_or_create(pool: &SqlitePool, user_id: &str) -> AppResult<UserProfile> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            INSERT INTO user_profiles (id, user_id, mobile_number, address, created_at, updated_at)
            VALUES (?, ?, '', '', ?, ?)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Self::find_by_user(pool, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.user")))
    }

    pub async fn update(
        pool: &SqlitePool,
        user_id: &str,
        update: UpdateUserProfile,
    ) -> AppResult<UserProfile> {
        let current = Self::get_or_create(pool, user_id).await?;
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, UserProfile>(
            r#"
            UPDATE user_profiles
            SET
                mobile_number = ?,
                address = ?,
                date_of_birth = ?,
                updated_at = ?
            WHERE user_id = ?
            RETURNING id, user_id, mobile_number, address, date_of_birth, created_at, updated_at
            "#,
        )
        .bind(update.mobile_number.unwrap_or(current.mobile_number))
        .bind(update.address.unwrap_or(current.address))
        .bind(update.date_of_birth.or(current.date_of_birth))
        .bind(now)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::memory_pool;
    use crate::db::UserRepository;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn update_keeps_fields_that_were_not_sent() {
        let pool = memory_pool().await;
        let user = UserRepository::create_with_profile(
            &pool,
            CreateUser {
                username: "ram".to_string(),
                email: "ram@example.com".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: "x".to_string(),
                is_staff: false,
            },
            "9811111111",
        )
        .await
        .unwrap();

        let dob = NaiveDate::from_ymd_opt(2001, 4, 14).unwrap();
        let profile = ProfileRepository::update(
            &pool,
            &user.id,
            UpdateUserProfile {
                address: Some("Lakeside, Pokhara".to_string()),
                date_of_birth: Some(dob),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(profile.mobile_number, "9811111111");
        assert_eq!(profile.address, "Lakeside, Pokhara");
        assert_eq!(profile.date_of_birth, Some(dob));
    }
}
