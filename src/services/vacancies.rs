//! Vacancy applications: validation, CV storage and the application fee ledger.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{
    ApplicationPaymentStatus, ApplicationRepository, CreateApplication, CreatePaymentLog,
    PaymentLogRepository, PaymentMethod, VacancyApplication, VacancyRepository,
};
use crate::error::{AppError, AppErrorWithDetails, AppResult, FieldErrors};
use crate::i18n::{t, t_with};
use crate::services::enrollment::{manual_transaction_id, ConfirmOutcome, ConfirmPayment};
use crate::services::validation::{is_valid_email, is_valid_phone, normalize_email};

/// Where uploaded CVs end up. Paths handed back are relative to the storage root.
#[async_trait]
pub trait CvStorage: Send + Sync {
    async fn store(&self, file_name: &str, bytes: &[u8], today: NaiveDate) -> AppResult<String>;

    async fn remove(&self, relative_path: &str) -> AppResult<()>;
}

/// Files under `<root>/applications/cvs/YYYY/MM/DD/`.
pub struct LocalCvStorage {
    root: PathBuf,
}

impl LocalCvStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Keep ASCII letters, digits, dot, dash and underscore; everything else becomes `_`.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "cv.pdf".to_string()
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl CvStorage for LocalCvStorage {
    async fn store(&self, file_name: &str, bytes: &[u8], today: NaiveDate) -> AppResult<String> {
        let dir = format!(
            "applications/cvs/{:04}/{:02}/{:02}",
            today.year(),
            today.month(),
            today.day()
        );
        let simple = Uuid::new_v4().simple().to_string();
        let relative = format!("{}/{}_{}", dir, &simple[..8], sanitize_file_name(file_name));

        tokio::fs::create_dir_all(self.root.join(&dir)).await?;
        tokio::fs::write(self.root.join(&relative), bytes).await?;

        tracing::debug!("Stored CV ({} bytes) at {}", bytes.len(), relative);
        Ok(relative)
    }

    async fn remove(&self, relative_path: &str) -> AppResult<()> {
        match tokio::fs::remove_file(self.root.join(relative_path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CvUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub cv: Option<CvUpload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    Submitted,
    Duplicate,
    /// A failed application reopened for payment.
    Resubmitted,
}

impl ApplyOutcome {
    pub fn message_key(self) -> &'static str {
        match self {
            ApplyOutcome::Submitted => "application.submitted",
            ApplyOutcome::Duplicate => "application.duplicate",
            ApplyOutcome::Resubmitted => "application.resubmitted",
        }
    }
}

/// Limits applied to each submission.
#[derive(Debug, Clone, Copy)]
pub struct ApplicationRules {
    pub fee_cents: i64,
    pub cv_max_bytes: usize,
}

impl ApplicationForm {
    /// Field-level checks; nothing is stored when this fails.
    pub fn validate(&self, rules: &ApplicationRules) -> Result<(), AppErrorWithDetails> {
        let mut errors = FieldErrors::new();

        if self.full_name.trim().is_empty() {
            errors.add("full_name", t("validation.required"));
        }

        if self.email.trim().is_empty() {
            errors.add("email", t("validation.required"));
        } else if !is_valid_email(&self.email) {
            errors.add("email", t("validation.email_invalid"));
        }

        if self.phone.trim().is_empty() {
            errors.add("phone", t("validation.required"));
        } else if !is_valid_phone(&self.phone) {
            errors.add("phone", t("validation.phone_invalid"));
        }

        match &self.cv {
            None => errors.add("cv", t("validation.cv_required")),
            Some(cv) if cv.bytes.is_empty() => errors.add("cv", t("validation.cv_required")),
            Some(cv) => {
                if !cv.file_name.to_lowercase().ends_with(".pdf") {
                    errors.add("cv", t("validation.cv_not_pdf"));
                }
                if cv.bytes.len() > rules.cv_max_bytes {
                    let max_mb = (rules.cv_max_bytes / (1024 * 1024)).to_string();
                    errors.add("cv", t_with("validation.cv_too_large", &[("max_mb", max_mb.as_str())]));
                }
            }
        }

        errors.into_result()
    }
}

async fn remove_quietly(storage: &dyn CvStorage, relative_path: &str) {
    if let Err(e) = storage.remove(relative_path).await {
        tracing::warn!("Failed to remove orphaned CV {}: {:?}", relative_path, e);
    }
}

pub struct VacancyService;

impl VacancyService {
    pub async fn apply(
        pool: &SqlitePool,
        storage: &dyn CvStorage,
        vacancy_id: &str,
        form: ApplicationForm,
        rules: ApplicationRules,
        today: NaiveDate,
    ) -> Result<(VacancyApplication, ApplyOutcome), AppErrorWithDetails> {
        let vacancy = VacancyRepository::find_by_id(pool, vacancy_id)
            .await?
            .ok_or_else(|| AppError::NotFound(t("not_found.vacancy")))?;
        if !vacancy.accepts_applications(today) {
            return Err(AppError::Conflict(t("application.vacancy_closed")).into());
        }

        form.validate(&rules)?;
        let email = normalize_email(&form.email);

        let previous =
            match ApplicationRepository::find_by_vacancy_and_email(pool, &vacancy.id, &email).await? {
                Some(existing) if existing.payment_status != ApplicationPaymentStatus::Failed => {
                    tracing::debug!("Duplicate application for vacancy {} by {}", vacancy.id, email);
                    return Ok((existing, ApplyOutcome::Duplicate));
                }
                other => other,
            };

        let Some(cv) = form.cv else {
            return Err(AppError::Validation(t("validation.cv_required")).into());
        };
        let cv_path = storage.store(&cv.file_name, &cv.bytes, today).await?;

        let submission = CreateApplication {
            vacancy_id: vacancy.id.clone(),
            full_name: form.full_name.trim().to_string(),
            email: email.clone(),
            phone: form.phone.trim().to_string(),
            cv_path: cv_path.clone(),
            payment_amount_cents: rules.fee_cents,
        };

        if let Some(failed) = previous {
            return Self::resubmit(pool, storage, failed, &submission).await;
        }

        let created = ApplicationRepository::create(pool, submission).await;

        match created {
            Ok(application) => {
                tracing::info!(
                    "Application {} submitted for vacancy {}",
                    application.id,
                    vacancy.id
                );
                Ok((application, ApplyOutcome::Submitted))
            }
            Err(e) => {
                remove_quietly(storage, &cv_path).await;
                if e.is_unique_violation() {
                    let existing =
                        ApplicationRepository::find_by_vacancy_and_email(pool, &vacancy.id, &email)
                            .await?
                            .ok_or(e)?;
                    return Ok((existing, ApplyOutcome::Duplicate));
                }
                Err(e.into())
            }
        }
    }

    /// Reopen a failed application with the new details and CV.
    async fn resubmit(
        pool: &SqlitePool,
        storage: &dyn CvStorage,
        failed: VacancyApplication,
        submission: &CreateApplication,
    ) -> Result<(VacancyApplication, ApplyOutcome), AppErrorWithDetails> {
        let reopened = match ApplicationRepository::reopen_failed(pool, &failed.id, submission).await {
            Ok(reopened) => reopened,
            Err(e) => {
                remove_quietly(storage, &submission.cv_path).await;
                return Err(e.into());
            }
        };

        match reopened {
            Some(application) => {
                if failed.cv_path != application.cv_path {
                    remove_quietly(storage, &failed.cv_path).await;
                }
                tracing::info!("Application {} resubmitted after failed payment", application.id);
                Ok((application, ApplyOutcome::Resubmitted))
            }
            None => {
                // settled by a concurrent request
                remove_quietly(storage, &submission.cv_path).await;
                let current = ApplicationRepository::find_by_id(pool, &failed.id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(t("not_found.application")))?;
                Ok((current, ApplyOutcome::Duplicate))
            }
        }
    }

    /// Staff action: pending fee -> failed, logged.
    pub async fn mark_failed(
        pool: &SqlitePool,
        application_id: &str,
        now: NaiveDateTime,
    ) -> AppResult<VacancyApplication> {
        let mut tx = pool.begin().await?;

        let Some(failed) = ApplicationRepository::mark_failed(&mut tx, application_id).await? else {
            tx.rollback().await?;
            return match ApplicationRepository::find_by_id(pool, application_id).await? {
                Some(_) => Err(AppError::Conflict(t("application.fail_not_pending"))),
                None => Err(AppError::NotFound(t("not_found.application"))),
            };
        };

        let transaction_id = failed
            .transaction_id
            .clone()
            .unwrap_or_else(|| manual_transaction_id(&failed.id, now));
        let method = failed
            .payment_method
            .clone()
            .unwrap_or_else(|| PaymentMethod::Manual.as_str().to_string());

        PaymentLogRepository::create_for_application(
            &mut tx,
            CreatePaymentLog {
                parent_id: failed.id.clone(),
                transaction_id,
                amount_cents: failed.payment_amount_cents,
                payment_method: method,
                status: "failed".to_string(),
                response_data: serde_json::json!({ "note": "Payment marked as failed" }),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!("Application {} fee marked as failed", failed.id);
        Ok(failed)
    }

    /// Pay the application fee of a pending application.
    pub async fn confirm_payment(
        pool: &SqlitePool,
        application_id: &str,
        request: ConfirmPayment,
        now: NaiveDateTime,
    ) -> AppResult<(VacancyApplication, ConfirmOutcome)> {
        let application = ApplicationRepository::find_by_id(pool, application_id)
            .await?
            .ok_or_else(|| AppError::NotFound(t("not_found.application")))?;

        match application.payment_status {
            ApplicationPaymentStatus::Completed => {
                return Ok((application, ConfirmOutcome::AlreadyCompleted))
            }
            ApplicationPaymentStatus::Failed => {
                return Err(AppError::Conflict(t("application.not_pending")))
            }
            ApplicationPaymentStatus::Pending => {}
        }

        let method = match request.payment_method.as_deref() {
            None => PaymentMethod::Manual,
            Some(raw) => PaymentMethod::parse(raw).ok_or_else(|| {
                AppError::Validation(t_with("validation.unknown_payment_method", &[("method", raw)]))
            })?,
        };
        let transaction_id = request
            .transaction_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| manual_transaction_id(&application.id, now));

        let mut tx = pool.begin().await?;

        let Some(paid) = ApplicationRepository::confirm_payment(
            &mut tx,
            &application.id,
            method.as_str(),
            &transaction_id,
        )
        .await?
        else {
            tx.rollback().await?;
            let current = ApplicationRepository::find_by_id(pool, application_id)
                .await?
                .ok_or_else(|| AppError::NotFound(t("not_found.application")))?;
            return match current.payment_status {
                ApplicationPaymentStatus::Completed => Ok((current, ConfirmOutcome::AlreadyCompleted)),
                _ => Err(AppError::Conflict(t("application.not_pending"))),
            };
        };

        PaymentLogRepository::create_for_application(
            &mut tx,
            CreatePaymentLog {
                parent_id: paid.id.clone(),
                transaction_id: transaction_id.clone(),
                amount_cents: paid.payment_amount_cents,
                payment_method: method.as_str().to_string(),
                status: "completed".to_string(),
                response_data: serde_json::json!({ "note": "Application fee paid" }),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!("Application {} fee paid ({})", paid.id, transaction_id);
        Ok((paid, ConfirmOutcome::Confirmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::vacancy::tests::sample_vacancy;
    use crate::db::testing::memory_pool;
    use std::sync::Mutex;

    /// Records writes in memory instead of touching the filesystem.
    #[derive(Default)]
    struct MemoryStorage {
        files: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CvStorage for MemoryStorage {
        async fn store(&self, file_name: &str, _bytes: &[u8], today: NaiveDate) -> AppResult<String> {
            let path = format!("applications/cvs/{}/{}", today.format("%Y/%m/%d"), file_name);
            self.files.lock().unwrap().push(path.clone());
            Ok(path)
        }

        async fn remove(&self, relative_path: &str) -> AppResult<()> {
            self.files.lock().unwrap().retain(|p| p != relative_path);
            Ok(())
        }
    }

    const RULES: ApplicationRules = ApplicationRules {
        fee_cents: 10_000,
        cv_max_bytes: 1024,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
    }

    fn form(email: &str, file_name: &str, size: usize) -> ApplicationForm {
        ApplicationForm {
            full_name: "Gita Thapa".to_string(),
            email: email.to_string(),
            phone: "+977 9800000000".to_string(),
            cv: Some(CvUpload {
                file_name: file_name.to_string(),
                bytes: vec![b'%'; size],
            }),
        }
    }

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd.pdf"), "passwd.pdf");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\My CV (1).PDF"), "My_CV__1_.PDF");
        assert_eq!(sanitize_file_name(".."), "cv.pdf");
    }

    #[test]
    fn validation_rejects_bad_cv_without_storage() {
        assert!(form("g@example.com", "cv.PDF", 1024).validate(&RULES).is_ok());
        assert!(form("g@example.com", "cv.docx", 10).validate(&RULES).is_err());
        assert!(form("g@example.com", "cv.pdf", 1025).validate(&RULES).is_err());
        assert!(form("not-an-email", "cv.pdf", 10).validate(&RULES).is_err());

        let mut no_cv = form("g@example.com", "cv.pdf", 10);
        no_cv.cv = None;
        assert!(no_cv.validate(&RULES).is_err());
    }

    #[tokio::test]
    async fn apply_stores_cv_once_and_treats_duplicates_as_benign() {
        let pool = memory_pool().await;
        let storage = MemoryStorage::default();
        let vacancy = VacancyRepository::create(&pool, sample_vacancy(today()))
            .await
            .unwrap();

        let (first, outcome) = VacancyService::apply(
            &pool,
            &storage,
            &vacancy.id,
            form("Gita@Example.com", "cv.pdf", 100),
            RULES,
            today(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, ApplyOutcome::Submitted);
        assert_eq!(first.email, "gita@example.com");
        assert_eq!(first.payment_amount_cents, 10_000);
        assert_eq!(first.cv_path, "applications/cvs/2025/05/01/cv.pdf");

        let (second, outcome) = VacancyService::apply(
            &pool,
            &storage,
            &vacancy.id,
            form("gita@example.com", "other.pdf", 100),
            RULES,
            today(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, ApplyOutcome::Duplicate);
        assert_eq!(second.id, first.id);
        assert_eq!(storage.files.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_or_closed_submissions_write_nothing() {
        let pool = memory_pool().await;
        let storage = MemoryStorage::default();
        let vacancy = VacancyRepository::create(&pool, sample_vacancy(today()))
            .await
            .unwrap();

        let err = VacancyService::apply(
            &pool,
            &storage,
            &vacancy.id,
            form("g@example.com", "cv.exe", 100),
            RULES,
            today(),
        )
        .await;
        assert!(err.is_err());

        let closed = VacancyService::apply(
            &pool,
            &storage,
            &vacancy.id,
            form("g@example.com", "cv.pdf", 100),
            RULES,
            today().succ_opt().unwrap(),
        )
        .await;
        assert!(closed.is_err());

        assert!(storage.files.lock().unwrap().is_empty());
        let stored = ApplicationRepository::list_for_vacancy(&pool, &vacancy.id)
            .await
            .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn fee_confirmation_logs_once() {
        let pool = memory_pool().await;
        let storage = MemoryStorage::default();
        let vacancy = VacancyRepository::create(&pool, sample_vacancy(today()))
            .await
            .unwrap();
        let (application, _) = VacancyService::apply(
            &pool,
            &storage,
            &vacancy.id,
            form("g@example.com", "cv.pdf", 100),
            RULES,
            today(),
        )
        .await
        .unwrap();
        let now = today().and_hms_opt(9, 0, 0).unwrap();

        let (paid, outcome) =
            VacancyService::confirm_payment(&pool, &application.id, ConfirmPayment::default(), now)
                .await
                .unwrap();
        assert_eq!(outcome, ConfirmOutcome::Confirmed);
        assert_eq!(paid.payment_status, ApplicationPaymentStatus::Completed);
        assert_eq!(paid.payment_method.as_deref(), Some("manual"));

        let (_, outcome) =
            VacancyService::confirm_payment(&pool, &application.id, ConfirmPayment::default(), now)
                .await
                .unwrap();
        assert_eq!(outcome, ConfirmOutcome::AlreadyCompleted);

        let logs = PaymentLogRepository::list_for_application(&pool, &application.id)
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].amount_cents, 10_000);
    }

    #[tokio::test]
    async fn failed_fee_is_logged_and_blocks_confirmation() {
        let pool = memory_pool().await;
        let storage = MemoryStorage::default();
        let vacancy = VacancyRepository::create(&pool, sample_vacancy(today()))
            .await
            .unwrap();
        let (application, _) = VacancyService::apply(
            &pool,
            &storage,
            &vacancy.id,
            form("g@example.com", "cv.pdf", 100),
            RULES,
            today(),
        )
        .await
        .unwrap();
        let now = today().and_hms_opt(9, 0, 0).unwrap();

        let failed = VacancyService::mark_failed(&pool, &application.id, now)
            .await
            .unwrap();
        assert_eq!(failed.payment_status, ApplicationPaymentStatus::Failed);

        assert!(matches!(
            VacancyService::mark_failed(&pool, &application.id, now).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            VacancyService::mark_failed(&pool, "missing", now).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            VacancyService::confirm_payment(&pool, &application.id, ConfirmPayment::default(), now)
                .await,
            Err(AppError::Conflict(_))
        ));

        let logs = PaymentLogRepository::list_for_application(&pool, &application.id)
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, "failed");
        assert_eq!(
            logs[0].transaction_id,
            format!("MANUAL_{}_20250501090000", application.id)
        );
    }

    #[tokio::test]
    async fn reapplying_after_failed_fee_reopens_the_application() {
        let pool = memory_pool().await;
        let storage = MemoryStorage::default();
        let vacancy = VacancyRepository::create(&pool, sample_vacancy(today()))
            .await
            .unwrap();
        let (application, _) = VacancyService::apply(
            &pool,
            &storage,
            &vacancy.id,
            form("g@example.com", "first.pdf", 100),
            RULES,
            today(),
        )
        .await
        .unwrap();
        let now = today().and_hms_opt(9, 0, 0).unwrap();
        VacancyService::mark_failed(&pool, &application.id, now)
            .await
            .unwrap();

        let (reopened, outcome) = VacancyService::apply(
            &pool,
            &storage,
            &vacancy.id,
            form("g@example.com", "second.pdf", 100),
            RULES,
            today(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, ApplyOutcome::Resubmitted);
        assert_eq!(reopened.id, application.id);
        assert_eq!(reopened.payment_status, ApplicationPaymentStatus::Pending);
        assert_eq!(reopened.cv_filename(), "second.pdf");
        assert_eq!(
            *storage.files.lock().unwrap(),
            vec!["applications/cvs/2025/05/01/second.pdf".to_string()]
        );

        let (paid, outcome) =
            VacancyService::confirm_payment(&pool, &reopened.id, ConfirmPayment::default(), now)
                .await
                .unwrap();
        assert_eq!(outcome, ConfirmOutcome::Confirmed);
        assert_eq!(paid.payment_status, ApplicationPaymentStatus::Completed);

        // once paid, another submission is a plain duplicate
        let (_, outcome) = VacancyService::apply(
            &pool,
            &storage,
            &vacancy.id,
            form("g@example.com", "third.pdf", 100),
            RULES,
            today(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, ApplyOutcome::Duplicate);
    }

    #[tokio::test]
    async fn local_storage_writes_under_dated_directory() {
        let root = std::env::temp_dir().join(format!("cv-store-{}", Uuid::new_v4()));
        let storage = LocalCvStorage::new(&root);

        let path = storage.store("My CV.pdf", b"%PDF-1.4", today()).await.unwrap();
        assert!(path.starts_with("applications/cvs/2025/05/01/"));
        assert!(path.ends_with("_My_CV.pdf"));
        assert_eq!(tokio::fs::read(root.join(&path)).await.unwrap(), b"%PDF-1.4");

        storage.remove(&path).await.unwrap();
        storage.remove(&path).await.unwrap();
        assert!(!root.join(&path).exists());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
