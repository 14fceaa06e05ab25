pub mod application;
pub mod course;
pub mod enrollment;
pub mod payment_log;
pub mod profile;
pub mod review;
pub mod user;
pub mod vacancy;

pub use application::ApplicationRepository;
pub use course::CourseRepository;
pub use enrollment::EnrollmentRepository;
pub use payment_log::PaymentLogRepository;
pub use profile::ProfileRepository;
pub use review::ReviewRepository;
pub use user::UserRepository;
pub use vacancy::VacancyRepository;
