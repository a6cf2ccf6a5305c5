pub mod admin;
pub mod auth;
pub mod site;
pub mod student;
pub mod superadmin;
pub mod teacher;

pub use admin::admin_config;
pub use auth::auth_config;
pub use site::{not_found, site_config};
pub use student::student_config;
pub use superadmin::superadmin_config;
pub use teacher::teacher_config;
