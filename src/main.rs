use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use axum::body::Body;
use http::{HeaderValue, StatusCode};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};

mod config;
mod db;
mod error;
mod i18n;
mod middleware;
mod routes;
mod services;

use config::Config;
use services::auth::AuthService;
use services::init;
use services::vacancies::{CvStorage, LocalCvStorage};

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub storage: Arc<dyn CvStorage>,
    /// Source of "now"; everything time-dependent reads it through here.
    pub clock: fn() -> DateTime<Utc>,
}

#[derive(Debug, Parser)]
#[command(name = "education-foundation", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Insert the sample vacancy if it is missing
    SetupVacancies,
    /// Create a staff account, or promote an existing one
    CreateStaff {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may carry LOG_JSON and RUST_LOG, so load it before tracing
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::SetupVacancies => {
            let pool = init::init_db(&config).await?;
            let (vacancy, created) = init::seed_sample_vacancy(&pool).await?;
            if created {
                tracing::info!("Created vacancy: {} ({})", vacancy.title, vacancy.id);
            } else {
                tracing::info!("Vacancy already exists: {} ({})", vacancy.title, vacancy.id);
            }
            Ok(())
        }
        Command::CreateStaff {
            username,
            email,
            password,
        } => {
            let pool = init::init_db(&config).await?;
            let user = AuthService::ensure_staff(&pool, &username, &email, &password).await?;
            tracing::info!("Staff account ready: {} ({})", user.username, user.id);
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "education_foundation=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if Config::json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting Education Foundation service");

    let pool = init::init_db(&config).await?;
    init::init_media(&config).await?;

    let app_state = Arc::new(AppState {
        db: pool,
        storage: Arc::new(LocalCvStorage::new(&config.media.root)),
        config: config.clone(),
        clock: Utc::now,
    });

    let thread_shutdown = Arc::new(AtomicBool::new(false));
    let (app, auth_cleaner) = build_router(app_state, &thread_shutdown)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let shutdown = {
        let flag = thread_shutdown.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, draining connections");
            flag.store(true, Ordering::SeqCst);
        }
    };

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    {
        tracing::error!("Server error: {}", e);
    }

    // The cleanup thread checks the flag every second.
    thread_shutdown.store(true, Ordering::SeqCst);
    if let Err(e) = auth_cleaner.join() {
        tracing::warn!("Auth cleanup thread join failed: {:?}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to bind SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Rejections from the auth limiter use the same JSON error shape as
/// `AppError`, plus `Retry-After`.
fn rate_limit_response(error: GovernorError) -> http::Response<Body> {
    let (status, body, headers) = match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            let body = serde_json::json!({
                "error": {
                    "code": "RATE_LIMITED",
                    "message": "Rate limit exceeded",
                    "details": { "retry_after_seconds": wait_time }
                }
            });
            let mut hmap = headers.unwrap_or_default();
            if let Ok(value) = HeaderValue::from_str(&wait_time.to_string()) {
                hmap.insert(http::header::RETRY_AFTER, value);
            }
            (StatusCode::TOO_MANY_REQUESTS, body, Some(hmap))
        }
        GovernorError::UnableToExtractKey => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "error": {
                    "code": "BAD_REQUEST",
                    "message": "Unable to determine client IP for rate limiting"
                }
            }),
            None,
        ),
        GovernorError::Other { code, msg, headers } => (
            StatusCode::from_u16(code.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            serde_json::json!({
                "error": {
                    "code": "INTERNAL_ERROR",
                    "message": msg.unwrap_or_else(|| "Rate limiting error".to_string())
                }
            }),
            headers,
        ),
    };

    let mut resp = http::Response::new(Body::from(body.to_string()));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Some(hmap) = headers {
        for (name, value) in hmap.iter() {
            resp.headers_mut().append(name.clone(), value.clone());
        }
    }
    resp
}

/// Assemble the application router.
///
/// Also starts the thread that prunes the per-IP auth limiter; it exits once
/// `thread_shutdown` is set.
fn build_router(
    app_state: Arc<AppState>,
    thread_shutdown: &Arc<AtomicBool>,
) -> anyhow::Result<(Router, std::thread::JoinHandle<()>)> {
    let config = &app_state.config;
    let frontend_origin = config
        .server
        .frontend_url
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("Invalid FRONTEND_URL for CORS: {}", e))?;

    let mut auth_builder = GovernorConfigBuilder::default();
    auth_builder.per_second(config.rate_limit.auth_per_second.into());
    auth_builder.burst_size(config.rate_limit.auth_burst);
    let mut auth_builder = auth_builder.key_extractor(SmartIpKeyExtractor);
    auth_builder.error_handler(rate_limit_response);
    let auth_gov_conf = Arc::new(
        auth_builder
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build auth governor config"))?,
    );

    // Background cleanup for auth limiter storage
    let auth_cleaner = {
        let limiter = auth_gov_conf.limiter().clone();
        let interval = Duration::from_secs(60);
        let flag = thread_shutdown.clone();
        std::thread::spawn(move || {
            // Use smaller sleep granularity to allow quick shutdown.
            let tick = Duration::from_secs(1);
            loop {
                for _ in 0..interval.as_secs() {
                    if flag.load(Ordering::SeqCst) {
                        tracing::info!("Auth rate limiter cleanup thread exiting");
                        return;
                    }
                    std::thread::sleep(tick);
                }
                tracing::debug!("auth rate limiter size: {}", limiter.len());
                limiter.retain_recent();
            }
        })
    };

    let auth_rate_layer = GovernorLayer {
        config: auth_gov_conf,
    };

    let app = Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))
        // Auth routes (apply rate limiting for public auth endpoints)
        .nest("/api/auth", routes::auth::router().layer(auth_rate_layer))
        .nest("/api/profile", routes::profile::router())
        .nest("/api/courses", routes::courses::router())
        .nest("/api/enrollments", routes::enrollments::router())
        .nest("/api/vacancies", routes::vacancies::router(config))
        .nest("/api/applications", routes::applications::router())
        // Staff-only endpoints
        .nest("/api/admin", routes::admin::router())
        .with_state(app_state.clone())
        .layer(axum::middleware::from_fn(middleware::csp::csp_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(frontend_origin)
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::PUT,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                ])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    http::header::AUTHORIZATION,
                    http::header::ACCEPT,
                ])
                .allow_credentials(true),
        );

    Ok((app, auth_cleaner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chrono::TimeZone;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::db::testing::memory_pool;

    // 07:52 on Monday 2025-03-03 in Kathmandu (UTC+05:45).
    fn monday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 2, 7, 0).unwrap()
    }

    async fn test_app() -> (Router, Arc<AppState>) {
        let mut config = Config::default();
        config.jwt.secret = "router-test-secret".to_string();
        config.rate_limit.auth_per_second = 1;
        config.rate_limit.auth_burst = 100;

        let media = std::env::temp_dir().join(format!("ef-router-{}", uuid::Uuid::new_v4()));
        let state = Arc::new(AppState {
            db: memory_pool().await,
            storage: Arc::new(LocalCvStorage::new(media)),
            config: config.clone(),
            clock: monday_morning,
        });
        // The cleanup thread idles until the test process exits.
        let (app, _cleaner) = build_router(state.clone(), &Arc::new(AtomicBool::new(false))).unwrap();
        (app, state)
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn register(app: &Router, username: &str) -> String {
        let (status, body) = send(
            app,
            request(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "first_name": "Asha",
                    "last_name": "Gurung",
                    "email": format!("{}@example.com", username),
                    "mobile_number": "+977 9841234567",
                    "password1": "correct-horse",
                    "password2": "correct-horse",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn staff_token(state: &AppState) -> String {
        let staff = AuthService::ensure_staff(&state.db, "office", "office@example.com", "staff-password")
            .await
            .unwrap();
        AuthService::create_jwt(&state.config.jwt, &staff.id).unwrap()
    }

    async fn create_course(app: &Router, staff: &str) -> String {
        let (status, body) = send(
            app,
            request(
                "POST",
                "/api/admin/courses",
                Some(staff),
                Some(json!({
                    "title": "IELTS",
                    "price_cents": 500000,
                    "discount_basis_points": 1000,
                    "schedule_days": ["monday"],
                    "start_time": "08:00:00",
                    "end_time": "09:00:00"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_local_time() {
        let (app, _) = test_app().await;
        let (status, body) = send(&app, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["local_time"], "2025-03-03 07:52:00");
    }

    #[tokio::test]
    async fn login_by_username_or_email() {
        let (app, _) = test_app().await;
        register(&app, "asha").await;

        for login in ["asha", "ASHA@example.com"] {
            let (status, body) = send(
                &app,
                request(
                    "POST",
                    "/api/auth/login",
                    None,
                    Some(json!({ "login": login, "password": "correct-horse" })),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK, "{}", body);
            let token = body["token"].as_str().unwrap();

            let (status, me) = send(&app, request("GET", "/api/auth/me", Some(token), None)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(me["username"], "asha");
        }

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "login": "asha", "password": "wrong" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn registration_reports_field_errors() {
        let (app, _) = test_app().await;
        register(&app, "asha").await;

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({
                    "username": "asha",
                    "first_name": "A",
                    "last_name": "G",
                    "email": "asha@example.com",
                    "mobile_number": "12",
                    "password1": "short",
                    "password2": "different",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let fields = &body["error"]["details"];
        for field in ["username", "email", "mobile_number", "password2"] {
            assert!(fields.get(field).is_some(), "missing error for {}: {}", field, body);
        }
    }

    #[tokio::test]
    async fn admin_requires_staff() {
        let (app, _) = test_app().await;
        let (status, _) = send(&app, request("GET", "/api/admin/courses", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = register(&app, "asha").await;
        let (status, body) =
            send(&app, request("GET", "/api/admin/courses", Some(&token), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn enroll_confirm_and_remind_once() {
        let (app, state) = test_app().await;
        let staff = staff_token(&state).await;
        let course_id = create_course(&app, &staff).await;
        let token = register(&app, "asha").await;

        let enroll_uri = format!("/api/courses/{}/enroll", course_id);
        let (status, body) = send(&app, request("POST", &enroll_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["outcome"], "created");
        assert_eq!(body["enrollment"]["amount_paid_cents"], 450000);
        let enrollment_id = body["enrollment"]["id"].as_str().unwrap().to_string();

        // enrolling again hands back the same pending row
        let (status, body) = send(&app, request("POST", &enroll_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "pending_existing");
        assert_eq!(body["enrollment"]["id"], enrollment_id.as_str());

        let confirm_uri = format!("/api/enrollments/{}/confirm", enrollment_id);
        let (status, body) = send(&app, request("POST", &confirm_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["outcome"], "confirmed");
        assert_eq!(body["message"], "Successfully enrolled in IELTS!");
        assert_eq!(
            body["enrollment"]["transaction_id"],
            format!("MANUAL_{}_20250303020700", enrollment_id).as_str()
        );

        let (status, body) = send(&app, request("POST", &confirm_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "already_completed");

        let payments_uri = format!("/api/admin/enrollments/{}/payments", enrollment_id);
        let (_, logs) = send(&app, request("GET", &payments_uri, Some(&staff), None)).await;
        assert_eq!(logs.as_array().unwrap().len(), 1);

        let (status, listing) = send(&app, request("GET", "/api/courses/live", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listing["starting_soon"].as_array().unwrap().len(), 1);
        assert_eq!(listing["reminders"].as_array().unwrap().len(), 1);
        assert_eq!(listing["reminders"][0]["minutes_until_class"], 8);

        let (_, listing) = send(&app, request("GET", "/api/courses/live", Some(&token), None)).await;
        assert!(listing["reminders"].as_array().unwrap().is_empty());

        // anonymous callers see the listing without reminders
        let (_, listing) = send(&app, request("GET", "/api/courses/live", None, None)).await;
        assert_eq!(listing["starting_soon"].as_array().unwrap().len(), 1);
        assert!(listing["reminders"].as_array().unwrap().is_empty());

        let (_, detail) = send(
            &app,
            request("GET", &format!("/api/courses/{}", course_id), Some(&token), None),
        )
        .await;
        assert_eq!(detail["has_access"], true);
        assert_eq!(detail["status"], "starting_soon");

        let (_, profile) = send(&app, request("GET", "/api/profile", Some(&token), None)).await;
        assert_eq!(profile["has_active_live_class_enrollment"], true);
        assert_eq!(profile["enrolled_courses"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refunded_enrollment_cannot_be_reconfirmed() {
        let (app, state) = test_app().await;
        let staff = staff_token(&state).await;
        let course_id = create_course(&app, &staff).await;
        let token = register(&app, "asha").await;

        let (_, body) = send(
            &app,
            request("POST", &format!("/api/courses/{}/enroll", course_id), Some(&token), None),
        )
        .await;
        let enrollment_id = body["enrollment"]["id"].as_str().unwrap().to_string();
        let confirm_uri = format!("/api/enrollments/{}/confirm", enrollment_id);
        send(&app, request("POST", &confirm_uri, Some(&token), None)).await;

        let (status, body) = send(
            &app,
            request(
                "POST",
                &format!("/api/admin/enrollments/{}/refund", enrollment_id),
                Some(&staff),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["enrollment"]["payment_status"], "refunded");

        let (status, body) = send(&app, request("POST", &confirm_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    fn multipart(fields: &[(&str, &str)], cv: Option<(&str, &[u8])>) -> (String, Vec<u8>) {
        const BOUNDARY: &str = "----ef-test-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = cv {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"cv\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        (format!("multipart/form-data; boundary={}", BOUNDARY), body)
    }

    fn apply_request(vacancy_id: &str, content_type: String, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/vacancies/{}/apply", vacancy_id))
            .header("x-forwarded-for", "203.0.113.7")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn vacancy_application_flow() {
        let (app, state) = test_app().await;
        let (vacancy, _) = init::seed_sample_vacancy(&state.db).await.unwrap();

        let (status, listed) = send(&app, request("GET", "/api/vacancies", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let fields = [
            ("full_name", "Asha Gurung"),
            ("email", "Asha@Example.com"),
            ("phone", "+977-9841234567"),
        ];

        // wrong file type is rejected before anything is stored
        let (ct, body) = multipart(&fields, Some(("cv.docx", b"not a pdf")));
        let (status, err) = send(&app, apply_request(&vacancy.id, ct, body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err["error"]["details"].get("cv").is_some());

        let (ct, body) = multipart(&fields, Some(("My CV.PDF", b"%PDF-1.4 test")));
        let (status, created) = send(&app, apply_request(&vacancy.id, ct, body)).await;
        assert_eq!(status, StatusCode::CREATED, "{}", created);
        assert_eq!(created["outcome"], "submitted");
        assert_eq!(created["application"]["email"], "asha@example.com");
        let application_id = created["application"]["id"].as_str().unwrap().to_string();

        let (ct, body) = multipart(&fields, Some(("again.pdf", b"%PDF-1.4 again")));
        let (status, dup) = send(&app, apply_request(&vacancy.id, ct, body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dup["outcome"], "duplicate");
        assert_eq!(dup["application"]["id"], application_id.as_str());

        let confirm_uri = format!("/api/applications/{}/confirm", application_id);
        let (status, paid) = send(&app, request("POST", &confirm_uri, None, None)).await;
        assert_eq!(status, StatusCode::OK, "{}", paid);
        assert_eq!(paid["outcome"], "confirmed");
        assert_eq!(paid["application"]["payment_status"], "completed");

        let (_, again) = send(&app, request("POST", &confirm_uri, None, None)).await;
        assert_eq!(again["outcome"], "already_completed");

        let (status, detail) = send(
            &app,
            request("GET", &format!("/api/applications/{}", application_id), None, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["payment_completed"], true);
        assert_eq!(detail["vacancy"]["id"], vacancy.id.as_str());
    }

    #[tokio::test]
    async fn staff_failed_application_can_be_resubmitted() {
        let (app, state) = test_app().await;
        let (vacancy, _) = init::seed_sample_vacancy(&state.db).await.unwrap();
        let staff = staff_token(&state).await;
        let student = register(&app, "bikash").await;

        let fields = [
            ("full_name", "Bikash Rai"),
            ("email", "bikash@example.com"),
            ("phone", "9812345678"),
        ];
        let (ct, body) = multipart(&fields, Some(("cv.pdf", b"%PDF-1.4 first")));
        let (status, created) = send(&app, apply_request(&vacancy.id, ct, body)).await;
        assert_eq!(status, StatusCode::CREATED, "{}", created);
        let application_id = created["application"]["id"].as_str().unwrap().to_string();
        let fail_uri = format!("/api/admin/applications/{}/fail", application_id);

        let (status, _) = send(&app, request("POST", &fail_uri, Some(&student), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, failed) = send(&app, request("POST", &fail_uri, Some(&staff), None)).await;
        assert_eq!(status, StatusCode::OK, "{}", failed);
        assert_eq!(failed["application"]["payment_status"], "failed");

        let (status, err) = send(&app, request("POST", &fail_uri, Some(&staff), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"]["code"], "CONFLICT");

        let confirm_uri = format!("/api/applications/{}/confirm", application_id);
        let (status, _) = send(&app, request("POST", &confirm_uri, None, None)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (ct, body) = multipart(&fields, Some(("cv-v2.pdf", b"%PDF-1.4 second")));
        let (status, reopened) = send(&app, apply_request(&vacancy.id, ct, body)).await;
        assert_eq!(status, StatusCode::OK, "{}", reopened);
        assert_eq!(reopened["outcome"], "resubmitted");
        assert_eq!(reopened["application"]["id"], application_id.as_str());
        assert_eq!(reopened["application"]["payment_status"], "pending");

        let (status, paid) = send(&app, request("POST", &confirm_uri, None, None)).await;
        assert_eq!(status, StatusCode::OK, "{}", paid);
        assert_eq!(paid["outcome"], "confirmed");

        let (_, logs) = send(
            &app,
            request(
                "GET",
                &format!("/api/admin/applications/{}/payments", application_id),
                Some(&staff),
                None,
            ),
        )
        .await;
        let statuses: Vec<&str> = logs
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["status"].as_str().unwrap())
            .collect();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.contains(&"failed"));
        assert!(statuses.contains(&"completed"));
    }

    #[tokio::test]
    async fn responses_carry_security_headers() {
        let (app, _) = test_app().await;
        let resp = app
            .oneshot(request("GET", "/health", None, None))
            .await
            .unwrap();
        assert!(resp.headers().get("content-security-policy").is_some());
        assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn cors_preflight_allows_frontend_origin() {
        let (app, _) = test_app().await;
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/courses")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
    }
}
