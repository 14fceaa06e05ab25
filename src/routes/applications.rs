use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::{
    ApplicationPaymentStatus, ApplicationRepository, Vacancy, VacancyApplication,
    VacancyRepository,
};
use crate::error::{AppError, AppResult};
use crate::i18n::t;
use crate::routes::auth::AuthUser;
use crate::services::enrollment::{ConfirmOutcome, ConfirmPayment};
use crate::services::vacancies::VacancyService;
use crate::AppState;

// Applications are submitted without an account, so the id is the only key
// needed for the success page and the fee confirmation.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(my_applications))
        .route("/:id", get(application_detail))
        .route("/:id/confirm", post(confirm_application))
}

#[derive(Debug, Serialize)]
pub struct ApplicationDetail {
    pub application: VacancyApplication,
    pub vacancy: Option<Vacancy>,
    pub cv_filename: String,
    pub payment_completed: bool,
}

impl ApplicationDetail {
    fn new(application: VacancyApplication, vacancy: Option<Vacancy>) -> Self {
        ApplicationDetail {
            cv_filename: application.cv_filename().to_string(),
            payment_completed: application.payment_status == ApplicationPaymentStatus::Completed,
            application,
            vacancy,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub outcome: ConfirmOutcome,
    pub message: String,
    pub application: VacancyApplication,
}

/// Applications submitted with the caller's email address.
async fn my_applications(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<ApplicationDetail>>> {
    let applications = ApplicationRepository::list_by_email(&state.db, &user.email).await?;
    let mut out = Vec::with_capacity(applications.len());
    for application in applications {
        let vacancy = VacancyRepository::find_by_id(&state.db, &application.vacancy_id).await?;
        out.push(ApplicationDetail::new(application, vacancy));
    }
    Ok(Json(out))
}

async fn application_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<ApplicationDetail>> {
    let application = ApplicationRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(t("not_found.application")))?;
    let vacancy = VacancyRepository::find_by_id(&state.db, &application.vacancy_id).await?;
    Ok(Json(ApplicationDetail::new(application, vacancy)))
}

async fn confirm_application(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<ConfirmPayment>>,
) -> AppResult<Json<ConfirmResponse>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let (application, outcome) =
        VacancyService::confirm_payment(&state.db, &id, request, (state.clock)().naive_utc())
            .await?;

    let key = match outcome {
        ConfirmOutcome::Confirmed => "application.payment_success",
        ConfirmOutcome::AlreadyCompleted => "application.payment_already_completed",
    };
    Ok(Json(ConfirmResponse {
        outcome,
        message: t(key),
        application,
    }))
}
