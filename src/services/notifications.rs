use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{Course, CourseEnrollment, EnrollmentRepository};
use crate::error::AppResult;
use crate::i18n;
use crate::services::schedule::ClassStatus;

/// A "starting soon" notice handed to the student.
#[derive(Debug, Clone, Serialize)]
pub struct Reminder {
    pub course_id: String,
    pub course_title: String,
    pub enrollment_id: String,
    pub minutes_until_class: i64,
    pub message: String,
}

/// Pure form of the gate: a flag from an earlier day does not count.
pub fn should_notify(enrollment: &CourseEnrollment, today: NaiveDate) -> bool {
    !enrollment.notified_on(today)
}

pub struct NotificationService;

impl NotificationService {
    /// Claim today's notice slot for an enrollment.
    ///
    /// The check and the flag update happen in one statement, so at most one
    /// caller per enrollment and local day gets `true`.
    pub async fn try_claim(pool: &SqlitePool, enrollment: &CourseEnrollment, today: NaiveDate) -> AppResult<bool> {
        if !should_notify(enrollment, today) {
            return Ok(false);
        }
        let claimed = EnrollmentRepository::claim_notification(pool, &enrollment.id, today).await?;
        if claimed {
            tracing::debug!("Claimed starting-soon notice for enrollment {} on {}", enrollment.id, today);
        }
        Ok(claimed)
    }

    /// Reminders for the user's courses that are starting soon.
    ///
    /// `local_now` drives the schedule and the calendar day, `utc_now` the access check.
    pub async fn starting_soon_reminders(
        pool: &SqlitePool,
        user_id: &str,
        courses: &[Course],
        local_now: NaiveDateTime,
        utc_now: NaiveDateTime,
        window_minutes: i64,
        lang: Option<&str>,
    ) -> AppResult<Vec<Reminder>> {
        let today = local_now.date();
        let mut reminders = Vec::new();

        for course in courses {
            let schedule = course.schedule();
            if schedule.class_status(local_now, window_minutes) != ClassStatus::StartingSoon {
                continue;
            }
            let Some(enrollment) =
                EnrollmentRepository::find_by_user_and_course(pool, user_id, &course.id).await?
            else {
                continue;
            };
            if !enrollment.has_access(utc_now) {
                continue;
            }
            if !Self::try_claim(pool, &enrollment, today).await? {
                continue;
            }

            let minutes = schedule.minutes_until_class(local_now).unwrap_or(0);
            let minutes_text = minutes.to_string();
            reminders.push(Reminder {
                course_id: course.id.clone(),
                course_title: course.title.clone(),
                enrollment_id: enrollment.id.clone(),
                minutes_until_class: minutes,
                message: i18n::tr(
                    lang,
                    "reminder.starting_soon",
                    Some(&[("course", course.title.as_str()), ("minutes", minutes_text.as_str())][..]),
                ),
            });
        }

        if !reminders.is_empty() {
            tracing::info!("Issued {} starting-soon reminder(s) to user {}", reminders.len(), user_id);
        }
        Ok(reminders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::course::tests::sample_course;
    use crate::db::repository::enrollment::tests::seed_user;
    use crate::db::testing::memory_pool;
    use crate::db::CourseRepository;
    use crate::services::enrollment::{ConfirmPayment, EnrollmentService};

    // 2025-03-03 is a Monday; sample courses meet Mondays 08:00-09:00 local.
    fn local(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn reminder_once_per_enrollment_per_day() {
        let pool = memory_pool().await;
        let user = seed_user(&pool, "asha").await;
        let course = CourseRepository::create(&pool, sample_course("IELTS")).await.unwrap();
        let utc_now = local(3, 2, 0);
        let (_, pending, _) = EnrollmentService::initiate(&pool, &user.id, &course.id, utc_now)
            .await
            .unwrap();

        let courses = vec![course.clone()];

        // no reminder without a paid enrollment
        let none = NotificationService::starting_soon_reminders(
            &pool, &user.id, &courses, local(3, 7, 52), utc_now, 10, None,
        )
        .await
        .unwrap();
        assert!(none.is_empty());

        EnrollmentService::confirm(&pool, &user.id, &pending.id, ConfirmPayment::default(), utc_now, 365)
            .await
            .unwrap();

        let first = NotificationService::starting_soon_reminders(
            &pool, &user.id, &courses, local(3, 7, 52), utc_now, 10, None,
        )
        .await
        .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].minutes_until_class, 8);
        assert_eq!(first[0].message, "IELTS starts in 8 minutes.");

        let second = NotificationService::starting_soon_reminders(
            &pool, &user.id, &courses, local(3, 7, 55), utc_now, 10, None,
        )
        .await
        .unwrap();
        assert!(second.is_empty());

        // next Monday is a new day
        let next_week = NotificationService::starting_soon_reminders(
            &pool, &user.id, &courses, local(10, 7, 55), utc_now, 10, Some("ne"),
        )
        .await
        .unwrap();
        assert_eq!(next_week.len(), 1);
        assert_eq!(next_week[0].minutes_until_class, 5);
    }

    #[tokio::test]
    async fn no_reminder_outside_the_window() {
        let pool = memory_pool().await;
        let user = seed_user(&pool, "asha").await;
        let course = CourseRepository::create(&pool, sample_course("IELTS")).await.unwrap();
        let utc_now = local(3, 1, 0);
        let (_, pending, _) = EnrollmentService::initiate(&pool, &user.id, &course.id, utc_now)
            .await
            .unwrap();
        EnrollmentService::confirm(&pool, &user.id, &pending.id, ConfirmPayment::default(), utc_now, 365)
            .await
            .unwrap();

        for now in [local(3, 7, 30), local(3, 8, 30), local(4, 7, 55)] {
            let reminders = NotificationService::starting_soon_reminders(
                &pool, &user.id, &[course.clone()], now, utc_now, 10, None,
            )
            .await
            .unwrap();
            assert!(reminders.is_empty(), "unexpected reminder at {}", now);
        }
    }

    #[test]
    fn stale_flag_does_not_block() {
        let today = local(3, 7, 52).date();
        let mut enrollment = CourseEnrollment {
            id: "e".to_string(),
            user_id: "u".to_string(),
            course_id: "c".to_string(),
            payment_status: crate::db::PaymentStatus::Completed,
            payment_method: None,
            amount_paid_cents: 0,
            transaction_id: None,
            enrolled_at: local(1, 0, 0),
            payment_date: None,
            access_expiry: None,
            is_active: true,
            notified_10min: true,
            last_notification_date: today.pred_opt(),
        };
        assert!(should_notify(&enrollment, today));
        enrollment.last_notification_date = Some(today);
        assert!(!should_notify(&enrollment, today));
    }
}
