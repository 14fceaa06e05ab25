//! Database models split into separate files.
//! This module re-exports individual model modules so imports like
//! `use crate::db::models::*;` see every row type.

pub mod application;
pub mod course;
pub mod enrollment;
pub mod payment_log;
pub mod profile;
pub mod review;
pub mod user;
pub mod vacancy;

pub use self::application::*;
pub use self::course::*;
pub use self::enrollment::*;
pub use self::payment_log::*;
pub use self::profile::*;
pub use self::review::*;
pub use self::user::*;
pub use self::vacancy::*;
