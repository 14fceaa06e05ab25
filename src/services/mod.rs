pub mod auth;
pub mod catalog;
pub mod course_admin;
pub mod enrollment;
pub mod init;
pub mod notifications;
pub mod reviews;
pub mod schedule;
pub mod vacancies;
pub mod validation;
