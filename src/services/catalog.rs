//! Read-side shaping of courses: list cards, detail pages and the live listing.

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::db::{Course, CourseType, RatingSummary};
use crate::services::notifications::Reminder;
use crate::services::schedule::{ClassStatus, DaySet};

#[derive(Debug, Clone, Serialize)]
pub struct CourseView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_path: Option<String>,
    pub course_type: CourseType,
    pub price_cents: i64,
    pub discount_basis_points: i64,
    pub discounted_price_cents: i64,
    pub discount_cents: i64,
    pub schedule_days: DaySet,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub schedule_time: String,
    pub schedule_label: Option<String>,
    pub session_details: String,
    pub duration: String,
    pub instructor_name: String,
    pub status: ClassStatus,
    pub next_class: Option<NaiveDateTime>,
    pub minutes_until_class: Option<i64>,
}

impl CourseView {
    pub fn new(course: &Course, local_now: NaiveDateTime, window_minutes: i64) -> Self {
        let schedule = course.schedule();
        CourseView {
            id: course.id.clone(),
            title: course.title.clone(),
            description: course.description.clone(),
            image_path: course.image_path.clone(),
            course_type: course.course_type,
            price_cents: course.price_cents,
            discount_basis_points: course.discount_basis_points,
            discounted_price_cents: course.discounted_price_cents(),
            discount_cents: course.discount_cents(),
            schedule_days: schedule.days,
            start_time: course.start_time,
            end_time: course.end_time,
            schedule_time: course.schedule_time.clone(),
            schedule_label: schedule.label(),
            session_details: course.session_details.clone(),
            duration: course.duration.clone(),
            instructor_name: course.instructor_name.clone(),
            status: schedule.class_status(local_now, window_minutes),
            next_class: schedule.next_class_datetime(local_now),
            minutes_until_class: schedule.minutes_until_class(local_now),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: CourseView,
    pub rating: RatingSummary,
    /// Whether the caller holds a paid, unexpired enrollment; false when anonymous.
    pub has_access: bool,
    pub enrollment_id: Option<String>,
}

/// Courses grouped by their class status at one instant.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LiveListing {
    pub live_now: Vec<CourseView>,
    pub starting_soon: Vec<CourseView>,
    pub scheduled: Vec<CourseView>,
    pub recorded: Vec<CourseView>,
    pub reminders: Vec<Reminder>,
    pub local_time: Option<NaiveDateTime>,
}

impl LiveListing {
    pub fn partition(courses: &[Course], local_now: NaiveDateTime, window_minutes: i64) -> Self {
        let mut listing = LiveListing {
            local_time: Some(local_now),
            ..Default::default()
        };
        for course in courses {
            let view = CourseView::new(course, local_now, window_minutes);
            match view.status {
                ClassStatus::LiveNow => listing.live_now.push(view),
                ClassStatus::StartingSoon => listing.starting_soon.push(view),
                ClassStatus::Scheduled => listing.scheduled.push(view),
                ClassStatus::Recorded => listing.recorded.push(view),
            }
        }
        // soonest upcoming class first
        listing
            .scheduled
            .sort_by(|a, b| match (a.next_class, b.next_class) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
        listing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn course(id: &str, course_type: CourseType, days: &str, start: (u32, u32), end: (u32, u32)) -> Course {
        let stamp = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        Course {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            image_path: None,
            course_type,
            price_cents: 100_000,
            discount_basis_points: 2_500,
            schedule_days: days.to_string(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0),
            schedule_time: String::new(),
            session_details: String::new(),
            duration: String::new(),
            instructor_name: String::new(),
            is_active: true,
            created_at: stamp,
            updated_at: stamp,
        }
    }

    #[test]
    fn partition_by_status() {
        // Monday 08:30 local
        let now = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_hms_opt(8, 30, 0).unwrap();
        let courses = vec![
            course("live", CourseType::Live, r#"["monday"]"#, (8, 0), (9, 0)),
            course("soon", CourseType::Live, r#"["monday"]"#, (8, 35), (9, 35)),
            course("friday", CourseType::Live, r#"["friday"]"#, (8, 0), (9, 0)),
            course("tuesday", CourseType::Live, r#"["tuesday"]"#, (8, 0), (9, 0)),
            course("video", CourseType::Recorded, r#"["monday"]"#, (8, 0), (9, 0)),
            course("unscheduled", CourseType::Live, "[]", (8, 0), (9, 0)),
        ];

        let listing = LiveListing::partition(&courses, now, 10);
        assert_eq!(listing.live_now[0].id, "live");
        assert_eq!(listing.starting_soon[0].id, "soon");
        assert_eq!(listing.starting_soon[0].minutes_until_class, Some(5));
        assert_eq!(listing.recorded[0].id, "video");
        let scheduled: Vec<&str> = listing.scheduled.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(scheduled, vec!["tuesday", "friday", "unscheduled"]);
        assert_eq!(listing.scheduled[2].next_class, None);
    }

    #[test]
    fn view_carries_prices_and_label() {
        let now = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap().and_hms_opt(8, 30, 0).unwrap();
        let view = CourseView::new(
            &course("c", CourseType::Live, r#"["monday","wednesday"]"#, (8, 0), (9, 0)),
            now,
            10,
        );
        assert_eq!(view.discounted_price_cents, 75_000);
        assert_eq!(view.discount_cents, 25_000);
        assert_eq!(view.schedule_label.as_deref(), Some("Mon, Wed · 08:00 AM - 09:00 AM"));
        assert_eq!(view.status, ClassStatus::Scheduled);
        assert_eq!(
            view.next_class,
            NaiveDate::from_ymd_opt(2025, 3, 5).unwrap().and_hms_opt(8, 0, 0)
        );
    }
}
