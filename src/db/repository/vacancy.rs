use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

const VACANCY_COLUMNS: &str = r#"
    id, title, company_name, employment_type, location, salary_cents,
    level, mode, openings, start_date, deadline,
    description, requirements, responsibilities,
    is_active, created_at, updated_at
"#;

pub struct VacancyRepository;

impl VacancyRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Vacancy>> {
        let sql = format!("SELECT {} FROM vacancies WHERE id = ?", VACANCY_COLUMNS);
        sqlx::query_as::<_, Vacancy>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Active vacancies whose deadline has not passed on `today`, closest deadline first.
    pub async fn list_open(pool: &SqlitePool, today: NaiveDate) -> AppResult<Vec<Vacancy>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM vacancies
            WHERE is_active = 1 AND deadline >= ?
            ORDER BY deadline ASC, created_at DESC
            "#,
            VACANCY_COLUMNS
        );
        sqlx::query_as::<_, Vacancy>(&sql)
            .bind(today)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_by_title(pool: &SqlitePool, title: &str) -> AppResult<Option<Vacancy>> {
        let sql = format!(
            "SELECT {} FROM vacancies WHERE title = ? LIMIT 1",
            VACANCY_COLUMNS
        );
        sqlx::query_as::<_, Vacancy>(&sql)
            .bind(title)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn create(pool: &SqlitePool, vacancy: CreateVacancy) -> AppResult<Vacancy> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            INSERT INTO vacancies (
                id, title, company_name, employment_type, location, salary_cents,
                level, mode, openings, start_date, deadline,
                description, requirements, responsibilities,
                is_active, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            VACANCY_COLUMNS
        );
        sqlx::query_as::<_, Vacancy>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&vacancy.title)
            .bind(&vacancy.company_name)
            .bind(vacancy.employment_type)
            .bind(&vacancy.location)
            .bind(vacancy.salary_cents)
            .bind(vacancy.level)
            .bind(vacancy.mode)
            .bind(vacancy.openings)
            .bind(vacancy.start_date)
            .bind(vacancy.deadline)
            .bind(&vacancy.description)
            .bind(&vacancy.requirements)
            .bind(&vacancy.responsibilities)
            .bind(vacancy.is_active)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        vacancy: CreateVacancy,
    ) -> AppResult<Option<Vacancy>> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            UPDATE vacancies
            SET
                title = ?,
                company_name = ?,
                employment_type = ?,
                location = ?,
                salary_cents = ?,
                level = ?,
                mode = ?,
                openings = ?,
                start_date = ?,
                deadline = ?,
                description = ?,
                requirements = ?,
                responsibilities = ?,
                is_active = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING {}
            "#,
            VACANCY_COLUMNS
        );
        sqlx::query_as::<_, Vacancy>(&sql)
            .bind(&vacancy.title)
            .bind(&vacancy.company_name)
            .bind(vacancy.employment_type)
            .bind(&vacancy.location)
            .bind(vacancy.salary_cents)
            .bind(vacancy.level)
            .bind(vacancy.mode)
            .bind(vacancy.openings)
            .bind(vacancy.start_date)
            .bind(vacancy.deadline)
            .bind(&vacancy.description)
            .bind(&vacancy.requirements)
            .bind(&vacancy.responsibilities)
            .bind(vacancy.is_active)
            .bind(now)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::testing::memory_pool;

    pub(crate) fn sample_vacancy(deadline: NaiveDate) -> CreateVacancy {
        CreateVacancy {
            title: "Home Tuition Teacher".to_string(),
            company_name: "Creative Education Foundation".to_string(),
            employment_type: EmploymentType::PartTime,
            location: "Pokhara".to_string(),
            salary_cents: None,
            level: VacancyLevel::Mid,
            mode: WorkMode::Onsite,
            openings: 2,
            start_date: None,
            deadline,
            description: String::new(),
            requirements: String::new(),
            responsibilities: String::new(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn list_open_includes_deadline_day_and_skips_inactive() {
        let pool = memory_pool().await;
        let today = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();

        VacancyRepository::create(&pool, sample_vacancy(today)).await.unwrap();
        VacancyRepository::create(&pool, sample_vacancy(today.pred_opt().unwrap()))
            .await
            .unwrap();
        let mut inactive = sample_vacancy(today.succ_opt().unwrap());
        inactive.is_active = false;
        VacancyRepository::create(&pool, inactive).await.unwrap();

        let open = VacancyRepository::list_open(&pool, today).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].deadline, today);
    }
}
