use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Internship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum VacancyLevel {
    Entry,
    Mid,
    Senior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum WorkMode {
    Onsite,
    Remote,
    Hybrid,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Vacancy {
    pub id: String,
    pub title: String,
    pub company_name: String,
    pub employment_type: EmploymentType,
    pub location: String,
    pub salary_cents: Option<i64>,
    pub level: VacancyLevel,
    pub mode: WorkMode,
    pub openings: i64,
    pub start_date: Option<NaiveDate>,
    pub deadline: NaiveDate,
    pub description: String,
    pub requirements: String,
    pub responsibilities: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Vacancy {
    /// Open for applications on `today` (inclusive of the deadline day).
    pub fn accepts_applications(&self, today: NaiveDate) -> bool {
        self.is_active && today <= self.deadline
    }

    /// Newline separated requirement lines, blanks dropped.
    pub fn requirement_list(&self) -> Vec<String> {
        split_lines(&self.requirements)
    }

    pub fn responsibility_list(&self) -> Vec<String> {
        split_lines(&self.responsibilities)
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVacancy {
    pub title: String,
    pub company_name: String,
    pub employment_type: EmploymentType,
    #[serde(default)]
    pub location: String,
    pub salary_cents: Option<i64>,
    pub level: VacancyLevel,
    pub mode: WorkMode,
    #[serde(default = "default_openings")]
    pub openings: i64,
    pub start_date: Option<NaiveDate>,
    pub deadline: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub responsibilities: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_openings() -> i64 {
    1
}

fn default_true() -> bool {
    true
}
