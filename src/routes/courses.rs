use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::{
    Course, CourseEnrollment, CourseFilter, CourseRepository, CourseReview, CourseReviewWithAuthor,
    CourseType, EnrollmentRepository, RatingSummary, ReviewRepository,
};
use crate::error::{AppError, AppErrorWithDetails, AppResult};
use crate::routes::auth::{AuthUser, MaybeAuthUser};
use crate::routes::localized;
use crate::services::catalog::{CourseDetail, CourseView, LiveListing};
use crate::services::enrollment::{EnrollmentService, InitiateOutcome};
use crate::services::notifications::NotificationService;
use crate::services::reviews::{ReviewRequest, ReviewService};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_courses))
        // NOTE: "/live" must be registered before the generic "/:id" route
        .route("/live", get(live_courses))
        .route("/:id", get(course_detail))
        .route("/:id/enroll", post(enroll))
        .route(
            "/:id/reviews",
            get(list_reviews).post(submit_review).delete(delete_review),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub outcome: InitiateOutcome,
    pub message: String,
    pub enrollment: CourseEnrollment,
    pub course: CourseView,
}

#[derive(Debug, Serialize)]
pub struct ReviewsResponse {
    pub rating: RatingSummary,
    pub reviews: Vec<CourseReviewWithAuthor>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub message: String,
    pub review: CourseReview,
}

// ============================================================================
// Handlers
// ============================================================================

/// Active courses, optionally filtered by type and a title/description search.
async fn list_courses(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<CourseFilter>,
) -> AppResult<Json<Vec<CourseView>>> {
    let local_now = state.config.schedule.local_time((state.clock)());
    let window = state.config.schedule.starting_soon_window_minutes;

    let courses = CourseRepository::list_active(&state.db, &filter).await?;
    Ok(Json(
        courses
            .iter()
            .map(|c| CourseView::new(c, local_now, window))
            .collect(),
    ))
}

/// Active courses grouped by class status. Authenticated callers also get
/// their starting-soon reminders, each at most once per local day.
async fn live_courses(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
) -> AppResult<Json<LiveListing>> {
    let now = (state.clock)();
    let local_now = state.config.schedule.local_time(now);
    let window = state.config.schedule.starting_soon_window_minutes;

    let courses = CourseRepository::list_active(&state.db, &CourseFilter::default()).await?;
    let mut listing = LiveListing::partition(&courses, local_now, window);

    if let Some(user) = &user {
        let live: Vec<Course> = courses
            .into_iter()
            .filter(|c| c.course_type == CourseType::Live)
            .collect();
        listing.reminders = NotificationService::starting_soon_reminders(
            &state.db,
            &user.id,
            &live,
            local_now,
            now.naive_utc(),
            window,
            user.lang.as_deref(),
        )
        .await?;
    }

    Ok(Json(listing))
}

async fn course_detail(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<CourseDetail>> {
    let now = (state.clock)();
    let local_now = state.config.schedule.local_time(now);
    let window = state.config.schedule.starting_soon_window_minutes;

    let course = CourseRepository::find_active_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(localized(user.as_ref(), "not_found.course", None)))?;
    let rating = ReviewRepository::rating_summary(&state.db, &course.id).await?;

    let enrollment = match &user {
        Some(user) => {
            EnrollmentRepository::find_by_user_and_course(&state.db, &user.id, &course.id).await?
        }
        None => None,
    };
    let has_access = enrollment
        .as_ref()
        .map(|e| e.has_access(now.naive_utc()))
        .unwrap_or(false);

    Ok(Json(CourseDetail {
        course: CourseView::new(&course, local_now, window),
        rating,
        has_access,
        enrollment_id: enrollment.map(|e| e.id),
    }))
}

async fn enroll(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let now = (state.clock)();
    let (course, enrollment, outcome) =
        EnrollmentService::initiate(&state.db, &user.id, &id, now.naive_utc()).await?;

    let status = match outcome {
        InitiateOutcome::Created => StatusCode::CREATED,
        _ => StatusCode::OK,
    };
    let local_now = state.config.schedule.local_time(now);

    Ok((
        status,
        Json(EnrollResponse {
            outcome,
            message: localized(Some(&user), outcome.message_key(), None),
            enrollment,
            course: CourseView::new(
                &course,
                local_now,
                state.config.schedule.starting_soon_window_minutes,
            ),
        }),
    ))
}

async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<ReviewsResponse>> {
    let course = CourseRepository::find_active_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.course")))?;

    Ok(Json(ReviewsResponse {
        rating: ReviewRepository::rating_summary(&state.db, &course.id).await?,
        reviews: ReviewRepository::list_for_course(&state.db, &course.id).await?,
    }))
}

async fn submit_review(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>, AppErrorWithDetails> {
    let now = (state.clock)().naive_utc();
    let review = ReviewService::submit(&state.db, &user.id, &id, request, now).await?;
    Ok(Json(ReviewResponse {
        message: localized(Some(&user), "review.saved", None),
        review,
    }))
}

async fn delete_review(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    ReviewService::delete(&state.db, &user.id, &id).await?;
    Ok(Json(serde_json::json!({
        "message": localized(Some(&user), "review.deleted", None),
    })))
}

