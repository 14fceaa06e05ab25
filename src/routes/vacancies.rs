use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::config::Config;
use crate::db::{Vacancy, VacancyApplication, VacancyRepository};
use crate::error::{AppError, AppErrorWithDetails, AppResult};
use crate::i18n::{t, t_with};
use crate::services::vacancies::{
    ApplicationForm, ApplicationRules, ApplyOutcome, CvUpload, VacancyService,
};
use crate::AppState;

/// Room for the text fields and multipart framing on top of the CV itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(config: &Config) -> Router<Arc<AppState>> {
    let body_limit = config.vacancy.cv_max_bytes + FORM_OVERHEAD_BYTES;
    Router::new()
        .route("/", get(list_vacancies))
        .route("/:id", get(vacancy_detail))
        .route(
            "/:id/apply",
            post(apply).layer(DefaultBodyLimit::max(body_limit)),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct VacancyDetail {
    #[serde(flatten)]
    pub vacancy: Vacancy,
    pub requirement_list: Vec<String>,
    pub responsibility_list: Vec<String>,
    pub accepts_applications: bool,
    pub application_fee_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub outcome: ApplyOutcome,
    pub message: String,
    pub application: VacancyApplication,
}

// ============================================================================
// Handlers
// ============================================================================

/// Active vacancies whose deadline has not passed.
async fn list_vacancies(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<Vacancy>>> {
    let today = local_today(&state);
    Ok(Json(VacancyRepository::list_open(&state.db, today).await?))
}

async fn vacancy_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<VacancyDetail>> {
    let vacancy = VacancyRepository::find_by_id(&state.db, &id)
        .await?
        .filter(|v| v.is_active)
        .ok_or_else(|| AppError::NotFound(t("not_found.vacancy")))?;

    Ok(Json(VacancyDetail {
        requirement_list: vacancy.requirement_list(),
        responsibility_list: vacancy.responsibility_list(),
        accepts_applications: vacancy.accepts_applications(local_today(&state)),
        application_fee_cents: state.config.vacancy.application_fee_cents,
        vacancy,
    }))
}

async fn apply(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppErrorWithDetails> {
    let rules = ApplicationRules {
        fee_cents: state.config.vacancy.application_fee_cents,
        cv_max_bytes: state.config.vacancy.cv_max_bytes,
    };
    let form = read_form(multipart, &rules).await?;

    let (application, outcome) = VacancyService::apply(
        &state.db,
        state.storage.as_ref(),
        &id,
        form,
        rules,
        local_today(&state),
    )
    .await?;

    let status = match outcome {
        ApplyOutcome::Submitted => StatusCode::CREATED,
        ApplyOutcome::Duplicate | ApplyOutcome::Resubmitted => StatusCode::OK,
    };
    Ok((
        status,
        Json(ApplyResponse {
            outcome,
            message: t(outcome.message_key()),
            application,
        }),
    ))
}

// ============================================================================
// Helpers
// ============================================================================

fn local_today(state: &AppState) -> chrono::NaiveDate {
    state.config.schedule.local_time((state.clock)()).date()
}

/// Collect the application fields; unknown parts are skipped.
async fn read_form(mut multipart: Multipart, rules: &ApplicationRules) -> AppResult<ApplicationForm> {
    let mut form = ApplicationForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, rules))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "full_name" | "email" | "phone" => {
                let value = field.text().await.map_err(|e| multipart_error(e, rules))?;
                match name.as_str() {
                    "full_name" => form.full_name = value,
                    "email" => form.email = value,
                    _ => form.phone = value,
                }
            }
            "cv" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, rules))?;
                form.cv = Some(CvUpload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            other => tracing::debug!("Ignoring unexpected form field {:?}", other),
        }
    }

    Ok(form)
}

fn multipart_error(error: MultipartError, rules: &ApplicationRules) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let max_mb = (rules.cv_max_bytes / (1024 * 1024)).to_string();
        return AppError::Validation(t_with(
            "validation.cv_too_large",
            &[("max_mb", max_mb.as_str())],
        ));
    }
    tracing::debug!("Rejected multipart body: {}", error.body_text());
    AppError::BadRequest(error.body_text())
}
