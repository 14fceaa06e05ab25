use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::config::JwtConfig;
use crate::db::{CreateUser, User, UserRepository};
use crate::error::{AppError, AppErrorWithDetails, AppResult, FieldErrors};
use crate::i18n::t;
use crate::services::validation::{is_valid_email, is_valid_phone, normalize_email};

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub mobile_number: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

pub struct AuthService;

impl AuthService {
    pub fn hash_password(password: &str) -> AppResult<String> {
        Ok(bcrypt::hash(password, HASH_COST)?)
    }

    /// Create a signed JWT for a user id
    pub fn create_jwt(jwt: &JwtConfig, user_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(jwt.expiration_hours);
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(jwt.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Decode and validate a JWT, returning the claims
    pub fn decode_jwt(jwt: &JwtConfig, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(jwt.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Get user from JWT token
    pub async fn get_user_from_token(
        pool: &SqlitePool,
        jwt: &JwtConfig,
        token: &str,
    ) -> AppResult<User> {
        let claims = Self::decode_jwt(jwt, token)?;
        let user = UserRepository::find_by_id(pool, &claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;
        Ok(user)
    }

    /// Check a registration form, collecting every problem per field.
    pub async fn validate_registration(
        pool: &SqlitePool,
        req: &RegisterRequest,
    ) -> Result<(), AppErrorWithDetails> {
        let mut errors = FieldErrors::new();

        for (field, value) in [
            ("username", &req.username),
            ("first_name", &req.first_name),
            ("last_name", &req.last_name),
            ("email", &req.email),
            ("mobile_number", &req.mobile_number),
            ("password1", &req.password1),
            ("password2", &req.password2),
        ] {
            if value.trim().is_empty() {
                errors.add(field, t("validation.required"));
            }
        }

        let username = req.username.trim();
        if !username.is_empty() && UserRepository::username_exists(pool, username).await? {
            errors.add("username", t("validation.username_taken"));
        }

        if !errors.has("email") {
            if !is_valid_email(&req.email) {
                errors.add("email", t("validation.email_invalid"));
            } else if UserRepository::email_exists(pool, &normalize_email(&req.email)).await? {
                errors.add("email", t("validation.email_taken"));
            }
        }

        if !errors.has("mobile_number") && !is_valid_phone(&req.mobile_number) {
            errors.add("mobile_number", t("validation.mobile_invalid"));
        }

        if !errors.has("password1") && !errors.has("password2") {
            if req.password1 != req.password2 {
                errors.add("password2", t("validation.password_mismatch"));
            } else if req.password1.chars().count() < MIN_PASSWORD_LEN {
                errors.add("password2", t("validation.password_too_short"));
            }
        }

        errors.into_result()
    }

    /// Validate and create the account and its profile.
    pub async fn register(pool: &SqlitePool, req: RegisterRequest) -> Result<User, AppErrorWithDetails> {
        Self::validate_registration(pool, &req).await?;

        let new_user = CreateUser {
            username: req.username.trim().to_string(),
            email: normalize_email(&req.email),
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            password_hash: Self::hash_password(&req.password1)?,
            is_staff: false,
        };

        match UserRepository::create_with_profile(pool, new_user, req.mobile_number.trim()).await {
            Ok(user) => {
                tracing::info!("Registered user {} ({})", user.username, user.id);
                Ok(user)
            }
            Err(e) if e.is_unique_violation() => {
                // Lost a race against a concurrent registration; report it like the pre-check.
                Self::validate_registration(pool, &req).await?;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve `login` as a username first, then as an email.
    ///
    /// Every failure, including unexpected ones, comes back as `InvalidCredentials`.
    pub async fn authenticate(pool: &SqlitePool, login: &str, password: &str) -> AppResult<User> {
        match Self::try_authenticate(pool, login.trim(), password).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(AppError::InvalidCredentials),
            Err(e) => {
                tracing::error!("Login failed unexpectedly for {:?}: {:?}", login, e);
                Err(AppError::InvalidCredentials)
            }
        }
    }

    async fn try_authenticate(
        pool: &SqlitePool,
        login: &str,
        password: &str,
    ) -> AppResult<Option<User>> {
        if login.is_empty() || password.is_empty() {
            return Ok(None);
        }

        if let Some(user) = UserRepository::find_by_username(pool, login).await? {
            if bcrypt::verify(password, &user.password_hash)? {
                return Ok(Some(user));
            }
        }

        for user in UserRepository::find_all_by_email(pool, login).await? {
            if bcrypt::verify(password, &user.password_hash)? {
                return Ok(Some(user));
            }
        }

        Ok(None)
    }

    /// Create (or promote) a staff account. Used by the CLI.
    pub async fn ensure_staff(
        pool: &SqlitePool,
        username: &str,
        email: &str,
        password: &str,
    ) -> AppResult<User> {
        if let Some(existing) = UserRepository::find_by_username(pool, username).await? {
            let hash = Self::hash_password(password)?;
            return UserRepository::promote_to_staff(pool, &existing.id, &hash)
                .await?
                .ok_or_else(|| AppError::NotFound(t("not_found.user")));
        }

        UserRepository::create_with_profile(
            pool,
            CreateUser {
                username: username.to_string(),
                email: normalize_email(email),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: Self::hash_password(password)?,
                is_staff: true,
            },
            "",
        )
        .await
    }
}
