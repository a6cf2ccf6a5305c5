pub mod clock;
pub mod code_generator;
pub mod email;
pub mod jwt;
pub mod password;
pub mod username;

pub use code_generator::{generate_numeric_suffix, generate_qr_token};
pub use email::*;
pub use jwt::*;
pub use password::*;
pub use username::generate_unique_username;
