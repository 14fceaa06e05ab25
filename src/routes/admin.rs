use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{
    ApplicationPaymentLog, ApplicationRepository, ApplicationStatus, CourseEnrollment,
    CoursePaymentLog, CourseRepository, CreateVacancy, EnrollmentRepository, PaymentLogRepository,
    Vacancy, VacancyApplication, VacancyRepository,
};
use crate::error::{AppError, AppErrorWithDetails, AppResult, FieldErrors};
use crate::i18n::{t, t_with};
use crate::routes::auth::StaffUser;
use crate::services::catalog::CourseView;
use crate::services::course_admin::{CourseAdminService, CourseInput};
use crate::services::enrollment::EnrollmentService;
use crate::services::vacancies::VacancyService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Courses
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/activate", post(activate_courses))
        .route("/courses/deactivate", post(deactivate_courses))
        .route("/courses/:id", put(update_course))
        // Enrollments and the payment ledger
        .route("/enrollments", get(list_enrollments))
        .route("/enrollments/reset-notifications", post(reset_notifications))
        .route("/enrollments/:id/payments", get(enrollment_payments))
        .route("/enrollments/:id/fail", post(fail_enrollment))
        .route("/enrollments/:id/refund", post(refund_enrollment))
        .route("/payments", get(recent_payments))
        // Vacancies and applications
        .route("/vacancies", post(create_vacancy))
        .route("/vacancies/:id", put(update_vacancy))
        .route("/vacancies/:id/applications", get(vacancy_applications))
        .route("/applications/:id/status", put(set_application_status))
        .route("/applications/:id/fail", post(fail_application))
        .route("/applications/:id/payments", get(application_payments))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub affected: u64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationStatusRequest {
    pub status: ApplicationStatus,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub message: String,
    pub enrollment: CourseEnrollment,
}

// ============================================================================
// Courses
// ============================================================================

/// Every course, including inactive ones.
async fn list_courses(
    State(state): State<Arc<AppState>>,
    StaffUser(_staff): StaffUser,
) -> AppResult<Json<Vec<CourseView>>> {
    let local_now = state.config.schedule.local_time((state.clock)());
    let window = state.config.schedule.starting_soon_window_minutes;
    let courses = CourseRepository::list_all(&state.db).await?;
    Ok(Json(
        courses
            .iter()
            .map(|c| CourseView::new(c, local_now, window))
            .collect(),
    ))
}

async fn create_course(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Json(input): Json<CourseInput>,
) -> Result<impl IntoResponse, AppErrorWithDetails> {
    let course = CourseAdminService::create(&state.db, input).await?;
    tracing::info!("Staff {} created course {}", staff.id, course.id);
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update_course(
    State(state): State<Arc<AppState>>,
    StaffUser(_staff): StaffUser,
    Path(id): Path<String>,
    Json(input): Json<CourseInput>,
) -> Result<impl IntoResponse, AppErrorWithDetails> {
    let course = CourseAdminService::update(&state.db, &id, input).await?;
    Ok(Json(course))
}

async fn activate_courses(
    State(state): State<Arc<AppState>>,
    StaffUser(_staff): StaffUser,
    Json(request): Json<IdsRequest>,
) -> AppResult<Json<BulkResponse>> {
    set_courses_active(&state, &request.ids, true).await
}

async fn deactivate_courses(
    State(state): State<Arc<AppState>>,
    StaffUser(_staff): StaffUser,
    Json(request): Json<IdsRequest>,
) -> AppResult<Json<BulkResponse>> {
    set_courses_active(&state, &request.ids, false).await
}

async fn set_courses_active(
    state: &AppState,
    ids: &[String],
    active: bool,
) -> AppResult<Json<BulkResponse>> {
    if ids.is_empty() {
        return Err(AppError::BadRequest(t("validation.required")));
    }
    let affected = CourseRepository::set_active(&state.db, ids, active).await?;
    let count = affected.to_string();
    let key = if active {
        "admin.courses_activated"
    } else {
        "admin.courses_deactivated"
    };
    tracing::info!("{} course(s) set active={}", affected, active);
    Ok(Json(BulkResponse {
        affected,
        message: t_with(key, &[("count", count.as_str())]),
    }))
}

// ============================================================================
// Enrollments
// ============================================================================

async fn list_enrollments(
    State(state): State<Arc<AppState>>,
    StaffUser(_staff): StaffUser,
) -> AppResult<Json<Vec<CourseEnrollment>>> {
    Ok(Json(EnrollmentRepository::list_all(&state.db).await?))
}

async fn enrollment_payments(
    State(state): State<Arc<AppState>>,
    StaffUser(_staff): StaffUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<CoursePaymentLog>>> {
    EnrollmentRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(t("not_found.enrollment")))?;
    Ok(Json(
        PaymentLogRepository::list_for_enrollment(&state.db, &id).await?,
    ))
}

/// Most recent course payment events, newest first.
async fn recent_payments(
    State(state): State<Arc<AppState>>,
    StaffUser(_staff): StaffUser,
    Query(query): Query<PaymentsQuery>,
) -> AppResult<Json<Vec<CoursePaymentLog>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    Ok(Json(
        PaymentLogRepository::list_recent_course_logs(&state.db, limit).await?,
    ))
}

async fn fail_enrollment(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(id): Path<String>,
) -> AppResult<Json<TransitionResponse>> {
    let enrollment =
        EnrollmentService::mark_failed(&state.db, &id, (state.clock)().naive_utc()).await?;
    tracing::info!("Staff {} marked enrollment {} as failed", staff.id, id);
    Ok(Json(TransitionResponse {
        message: t("enrollment.marked_failed"),
        enrollment,
    }))
}

async fn refund_enrollment(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(id): Path<String>,
) -> AppResult<Json<TransitionResponse>> {
    let enrollment = EnrollmentService::refund(&state.db, &id, (state.clock)().naive_utc()).await?;
    tracing::info!("Staff {} refunded enrollment {}", staff.id, id);
    Ok(Json(TransitionResponse {
        message: t("enrollment.refunded"),
        enrollment,
    }))
}

/// Clear the daily reminder flags. An empty id list resets every enrollment.
async fn reset_notifications(
    State(state): State<Arc<AppState>>,
    StaffUser(_staff): StaffUser,
    body: Option<Json<IdsRequest>>,
) -> AppResult<Json<BulkResponse>> {
    let ids = body.map(|Json(b)| b.ids).unwrap_or_default();
    let affected = EnrollmentRepository::reset_notifications(&state.db, &ids).await?;
    let count = affected.to_string();
    Ok(Json(BulkResponse {
        affected,
        message: t_with("admin.notifications_reset", &[("count", count.as_str())]),
    }))
}

// ============================================================================
// Vacancies and applications
// ============================================================================

fn validate_vacancy(vacancy: &CreateVacancy) -> Result<(), AppErrorWithDetails> {
    let mut errors = FieldErrors::new();
    if vacancy.title.trim().is_empty() {
        errors.add("title", t("validation.required"));
    }
    if vacancy.company_name.trim().is_empty() {
        errors.add("company_name", t("validation.required"));
    }
    if vacancy.openings < 1 {
        errors.add("openings", t("validation.openings_min"));
    }
    if matches!(vacancy.salary_cents, Some(s) if s < 0) {
        errors.add("salary_cents", t("validation.amount_negative"));
    }
    errors.into_result()
}

async fn create_vacancy(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Json(request): Json<CreateVacancy>,
) -> Result<impl IntoResponse, AppErrorWithDetails> {
    validate_vacancy(&request)?;
    let vacancy = VacancyRepository::create(&state.db, request).await?;
    tracing::info!("Staff {} created vacancy {}", staff.id, vacancy.id);
    Ok((StatusCode::CREATED, Json(vacancy)))
}

async fn update_vacancy(
    State(state): State<Arc<AppState>>,
    StaffUser(_staff): StaffUser,
    Path(id): Path<String>,
    Json(request): Json<CreateVacancy>,
) -> Result<Json<Vacancy>, AppErrorWithDetails> {
    validate_vacancy(&request)?;
    let vacancy = VacancyRepository::update(&state.db, &id, request)
        .await?
        .ok_or_else(|| AppError::NotFound(t("not_found.vacancy")))?;
    Ok(Json(vacancy))
}

async fn vacancy_applications(
    State(state): State<Arc<AppState>>,
    StaffUser(_staff): StaffUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<VacancyApplication>>> {
    VacancyRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(t("not_found.vacancy")))?;
    Ok(Json(
        ApplicationRepository::list_for_vacancy(&state.db, &id).await?,
    ))
}

async fn set_application_status(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(id): Path<String>,
    Json(request): Json<ApplicationStatusRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let application = ApplicationRepository::set_status(&state.db, &id, request.status)
        .await?
        .ok_or_else(|| AppError::NotFound(t("not_found.application")))?;
    tracing::info!(
        "Staff {} set application {} to {:?}",
        staff.id,
        application.id,
        application.status
    );
    Ok(Json(serde_json::json!({
        "message": t("application.status_updated"),
        "application": application,
    })))
}

async fn fail_application(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let application =
        VacancyService::mark_failed(&state.db, &id, (state.clock)().naive_utc()).await?;
    tracing::info!("Staff {} marked application {} as failed", staff.id, id);
    Ok(Json(serde_json::json!({
        "message": t("application.marked_failed"),
        "application": application,
    })))
}

async fn application_payments(
    State(state): State<Arc<AppState>>,
    StaffUser(_staff): StaffUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<ApplicationPaymentLog>>> {
    ApplicationRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(t("not_found.application")))?;
    Ok(Json(
        PaymentLogRepository::list_for_application(&state.db, &id).await?,
    ))
}
