pub mod account_service;
pub mod attendance_service;
pub mod auth_service;
pub mod classroom_service;
pub mod dashboard_service;
pub mod school_service;
pub mod subscription_service;

pub use account_service::*;
pub use attendance_service::*;
pub use auth_service::*;
pub use classroom_service::*;
pub use dashboard_service::*;
pub use school_service::*;
pub use subscription_service::*;
