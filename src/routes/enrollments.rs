use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::{CourseEnrollment, CourseRepository, EnrollmentRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::routes::localized;
use crate::services::catalog::CourseView;
use crate::services::enrollment::{ConfirmOutcome, ConfirmPayment, EnrollmentService};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(my_enrollments))
        .route("/:id", get(enrollment_detail))
        .route("/:id/confirm", post(confirm_enrollment))
}

#[derive(Debug, Serialize)]
pub struct EnrollmentDetail {
    pub enrollment: CourseEnrollment,
    pub course: Option<CourseView>,
    pub has_access: bool,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub outcome: ConfirmOutcome,
    pub message: String,
    pub enrollment: CourseEnrollment,
}

/// The caller's paid enrollments.
async fn my_enrollments(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<EnrollmentDetail>>> {
    let enrollments = EnrollmentRepository::list_completed_for_user(&state.db, &user.id).await?;
    let mut out = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        out.push(detail(&state, enrollment).await?);
    }
    Ok(Json(out))
}

async fn enrollment_detail(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<EnrollmentDetail>> {
    let enrollment = EnrollmentRepository::find_for_user(&state.db, &id, &user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(localized(Some(&user), "not_found.enrollment", None)))?;
    Ok(Json(detail(&state, enrollment).await?))
}

async fn confirm_enrollment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    body: Option<Json<ConfirmPayment>>,
) -> AppResult<Json<ConfirmResponse>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let (enrollment, outcome) = EnrollmentService::confirm(
        &state.db,
        &user.id,
        &id,
        request,
        (state.clock)().naive_utc(),
        state.config.enrollment.access_days,
    )
    .await?;

    let message = match outcome {
        ConfirmOutcome::Confirmed => {
            let title = CourseRepository::find_by_id(&state.db, &enrollment.course_id)
                .await?
                .map(|c| c.title)
                .unwrap_or_default();
            localized(
                Some(&user),
                "enrollment.success",
                Some(&[("course", title.as_str())][..]),
            )
        }
        ConfirmOutcome::AlreadyCompleted => {
            localized(Some(&user), "enrollment.payment_already_completed", None)
        }
    };

    Ok(Json(ConfirmResponse {
        outcome,
        message,
        enrollment,
    }))
}

async fn detail(state: &AppState, enrollment: CourseEnrollment) -> AppResult<EnrollmentDetail> {
    let now = (state.clock)();
    let local_now = state.config.schedule.local_time(now);
    let course = CourseRepository::find_by_id(&state.db, &enrollment.course_id)
        .await?
        .map(|c| CourseView::new(&c, local_now, state.config.schedule.starting_soon_window_minutes));
    Ok(EnrollmentDetail {
        has_access: enrollment.has_access(now.naive_utc()),
        course,
        enrollment,
    })
}
