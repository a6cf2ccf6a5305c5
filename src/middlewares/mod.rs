pub mod auth;
pub mod cors;
pub mod subscription;

pub use auth::{AuthMiddleware, CurrentUser, current_user, require_role};
pub use cors::create_cors;
pub use subscription::SubscriptionGate;
