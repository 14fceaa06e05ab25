use chrono::NaiveTime;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::db::{Course, CourseRepository, CourseType, CreateCourse, MAX_PRICE_CENTS};
use crate::error::{AppError, AppErrorWithDetails, FieldErrors};
use crate::i18n::{t, t_with};
use crate::services::schedule::DaySet;

/// Course form as submitted by staff.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub image_path: Option<String>,
    #[serde(default = "default_course_type")]
    pub course_type: CourseType,
    pub price_cents: i64,
    #[serde(default)]
    pub discount_basis_points: i64,
    #[serde(default)]
    pub schedule_days: Vec<String>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub schedule_time: String,
    #[serde(default)]
    pub session_details: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub instructor_name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_course_type() -> CourseType {
    CourseType::Live
}

fn default_true() -> bool {
    true
}

impl CourseInput {
    pub fn validate(self) -> Result<CreateCourse, AppErrorWithDetails> {
        let mut errors = FieldErrors::new();

        if self.title.trim().is_empty() {
            errors.add("title", t("validation.required"));
        }
        if self.price_cents < 0 {
            errors.add("price_cents", t("validation.amount_negative"));
        } else if self.price_cents > MAX_PRICE_CENTS {
            let max = MAX_PRICE_CENTS.to_string();
            errors.add(
                "price_cents",
                t_with("validation.amount_too_large", &[("max", max.as_str())]),
            );
        }
        if !(0..=10_000).contains(&self.discount_basis_points) {
            errors.add("discount_basis_points", t("validation.discount_range"));
        }
        let days = match DaySet::parse_names(self.schedule_days.as_slice()) {
            Ok(days) => days,
            Err(token) => {
                errors.add(
                    "schedule_days",
                    t_with("validation.unknown_weekday", &[("day", token.as_str())]),
                );
                DaySet::NONE
            }
        };
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start > end {
                errors.add("end_time", t("validation.schedule_time_order"));
            }
        }

        errors.into_result()?;

        Ok(CreateCourse {
            title: self.title.trim().to_string(),
            description: self.description,
            image_path: self.image_path.filter(|p| !p.trim().is_empty()),
            course_type: self.course_type,
            price_cents: self.price_cents,
            discount_basis_points: self.discount_basis_points,
            schedule_days: days,
            start_time: self.start_time,
            end_time: self.end_time,
            schedule_time: self.schedule_time,
            session_details: self.session_details,
            duration: self.duration,
            instructor_name: self.instructor_name,
            is_active: self.is_active,
        })
    }
}

pub struct CourseAdminService;

impl CourseAdminService {
    pub async fn create(pool: &SqlitePool, input: CourseInput) -> Result<Course, AppErrorWithDetails> {
        let course = CourseRepository::create(pool, input.validate()?).await?;
        tracing::info!("Created course {} ({})", course.title, course.id);
        Ok(course)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        input: CourseInput,
    ) -> Result<Course, AppErrorWithDetails> {
        let course = CourseRepository::update(pool, id, input.validate()?)
            .await?
            .ok_or_else(|| AppError::NotFound(t("not_found.course")))?;
        tracing::info!("Updated course {} ({})", course.title, course.id);
        Ok(course)
    }
}
