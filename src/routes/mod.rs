pub mod admin;
pub mod applications;
pub mod auth;
pub mod courses;
pub mod enrollments;
pub mod health;
pub mod profile;
pub mod vacancies;

use crate::db::User;

/// Translate `key` into the caller's preferred language, falling back to the default.
pub(crate) fn localized(user: Option<&User>, key: &str, params: Option<&[(&str, &str)]>) -> String {
    crate::i18n::tr(user.and_then(|u| u.lang.as_deref()), key, params)
}
