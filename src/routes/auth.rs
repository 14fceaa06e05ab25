use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{User, UserRepository};
use crate::error::{AppError, AppErrorWithDetails};
use crate::services::auth::{AuthService, RegisterRequest};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me).put(update_me))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email address.
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: &'static str,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub is_staff: bool,
    pub lang: Option<String>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            is_staff: user.is_staff,
            lang: user.lang.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub lang: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppErrorWithDetails> {
    let user = AuthService::register(&state.db, request).await?;
    let token = AuthService::create_jwt(&state.config.jwt, &user.id)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": crate::i18n::t("auth.registered"),
            "token": token,
            "token_type": "Bearer",
            "user": UserResponse::from(&user),
        })),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = AuthService::authenticate(&state.db, &request.login, &request.password).await?;
    let token = AuthService::create_jwt(&state.config.jwt, &user.id)?;

    tracing::info!("User {} logged in", user.id);
    Ok(Json(TokenResponse {
        token,
        token_type: "Bearer",
        user: UserResponse::from(&user),
    }))
}

/// Get current user info
async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

/// Update current user's preferred language
async fn update_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateMeRequest>,
) -> Result<Json<UserResponse>, AppError> {
    // Normalize and validate requested language before persisting.
    let lang_to_set: Option<String> = match request.lang {
        Some(lang_str) => {
            let normalized = crate::i18n::normalize_language(&lang_str);
            if !crate::i18n::is_supported_language(&normalized) {
                return Err(AppError::BadRequest(crate::i18n::t_with(
                    "validation.unknown_choice",
                    &[("value", normalized.as_str())],
                )));
            }
            Some(normalized)
        }
        None => None,
    };
    UserRepository::set_lang(&state.db, &user.id, lang_to_set.as_deref()).await?;

    let updated = UserRepository::find_by_id(&state.db, &user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.user")))?;

    Ok(Json(UserResponse::from(&updated)))
}

// ============================================================================
// Auth Extractors
// ============================================================================

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Pull the bearer token out of the Authorization header, if any.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;
    if header.len() < 7 || !header[..7].eq_ignore_ascii_case("bearer ") {
        tracing::debug!("Authorization header doesn't start with 'Bearer '");
        return None;
    }
    let token = header[7..].trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Extractor for authenticated user
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            tracing::debug!("Missing or invalid Authorization header");
            AppError::Unauthorized
        })?;

        let user = AuthService::get_user_from_token(&state.db, &state.config.jwt, token)
            .await
            .map_err(|e| {
                tracing::debug!("Failed to get user from token: {:?}", e);
                e
            })?;

        tracing::debug!("Authenticated user: {}", user.id);
        Ok(AuthUser(user))
    }
}

/// Like [`AuthUser`] but anonymous requests (and bad tokens) yield `None`.
pub struct MaybeAuthUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(MaybeAuthUser(None));
        };
        match AuthService::get_user_from_token(&state.db, &state.config.jwt, token).await {
            Ok(user) => Ok(MaybeAuthUser(Some(user))),
            Err(AppError::Database(e)) => Err(AppError::Database(e)),
            Err(e) => {
                tracing::debug!("Ignoring unusable bearer token: {:?}", e);
                Ok(MaybeAuthUser(None))
            }
        }
    }
}

/// Authenticated user with `is_staff`.
pub struct StaffUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            tracing::warn!("Non-staff user {} attempted a staff action", user.id);
            return Err(AppError::Forbidden);
        }
        Ok(StaffUser(user))
    }
}
