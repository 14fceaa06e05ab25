use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::{
    CourseEnrollment, CourseRepository, EnrollmentRepository, ProfileRepository,
    UpdateUserProfile, UserProfile,
};
use crate::error::{AppErrorWithDetails, AppResult, FieldErrors};
use crate::routes::auth::{AuthUser, UserResponse};
use crate::services::catalog::CourseView;
use crate::services::validation::is_valid_phone;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_profile).put(update_profile))
}

#[derive(Debug, Serialize)]
pub struct EnrolledCourse {
    pub enrollment: CourseEnrollment,
    pub course: CourseView,
    pub has_access: bool,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub profile: UserProfile,
    pub enrolled_courses: Vec<EnrolledCourse>,
    pub has_active_live_class_enrollment: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub mobile_number: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<ProfileResponse>> {
    let now = (state.clock)();
    let utc_now = now.naive_utc();
    let local_now = state.config.schedule.local_time(now);
    let window = state.config.schedule.starting_soon_window_minutes;

    let profile = ProfileRepository::get_or_create(&state.db, &user.id).await?;

    let mut enrolled_courses = Vec::new();
    for enrollment in EnrollmentRepository::list_completed_for_user(&state.db, &user.id).await? {
        // A course deleted out from under an enrollment is skipped.
        let Some(course) = CourseRepository::find_by_id(&state.db, &enrollment.course_id).await?
        else {
            continue;
        };
        enrolled_courses.push(EnrolledCourse {
            has_access: enrollment.has_access(utc_now),
            course: CourseView::new(&course, local_now, window),
            enrollment,
        });
    }

    let has_active_live_class_enrollment =
        EnrollmentRepository::has_active_live_enrollment(&state.db, &user.id, utc_now).await?;

    Ok(Json(ProfileResponse {
        user: UserResponse::from(&user),
        profile,
        enrolled_courses,
        has_active_live_class_enrollment,
    }))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, AppErrorWithDetails> {
    let mut errors = FieldErrors::new();
    let mobile_number = request.mobile_number.map(|m| m.trim().to_string());
    if let Some(mobile) = &mobile_number {
        if !is_valid_phone(mobile) {
            errors.add("mobile_number", crate::i18n::t("validation.mobile_invalid"));
        }
    }
    errors.into_result()?;

    let profile = ProfileRepository::update(
        &state.db,
        &user.id,
        UpdateUserProfile {
            mobile_number,
            address: request.address.map(|a| a.trim().to_string()),
            date_of_birth: request.date_of_birth,
        },
    )
    .await?;

    tracing::info!("User {} updated their profile", user.id);
    Ok(Json(profile))
}
