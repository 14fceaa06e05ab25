use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::services::schedule::{ClassSchedule, DaySet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CourseType {
    Live,
    Recorded,
    Hybrid,
}

impl CourseType {
    pub fn as_str(self) -> &'static str {
        match self {
            CourseType::Live => "live",
            CourseType::Recorded => "recorded",
            CourseType::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_path: Option<String>,
    pub course_type: CourseType,
    pub price_cents: i64,
    /// Hundredths of a percent, 0..=10000.
    pub discount_basis_points: i64,
    /// JSON array of lowercase weekday names.
    pub schedule_days: String,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub schedule_time: String,
    pub session_details: String,
    pub duration: String,
    pub instructor_name: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Course {
    pub fn schedule(&self) -> ClassSchedule {
        ClassSchedule {
            course_type: self.course_type,
            days: DaySet::from_json_lossy(&self.schedule_days),
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    pub fn discounted_price_cents(&self) -> i64 {
        apply_discount(self.price_cents, self.discount_basis_points)
    }

    pub fn discount_cents(&self) -> i64 {
        self.price_cents - self.discounted_price_cents()
    }
}

/// Highest course price accepted from staff, in minor units.
pub const MAX_PRICE_CENTS: i64 = 100_000_000_000;

/// Price after a basis-point discount, rounded half-up to the minor unit.
pub fn apply_discount(price_cents: i64, discount_basis_points: i64) -> i64 {
    if discount_basis_points <= 0 {
        return price_cents;
    }
    let bps = i128::from(discount_basis_points.min(10_000));
    // never larger than the price itself, so it fits back into i64
    let discount = (i128::from(price_cents) * bps + 5_000) / 10_000;
    price_cents - discount as i64
}

/// Validated input for inserting a course.
#[derive(Debug, Clone)]
pub struct CreateCourse {
    pub title: String,
    pub description: String,
    pub image_path: Option<String>,
    pub course_type: CourseType,
    pub price_cents: i64,
    pub discount_basis_points: i64,
    pub schedule_days: DaySet,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub schedule_time: String,
    pub session_details: String,
    pub duration: String,
    pub instructor_name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseFilter {
    pub course_type: Option<CourseType>,
    pub q: Option<String>,
}
