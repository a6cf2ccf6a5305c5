pub mod attendance;
pub mod classroom;
pub mod common;
pub mod dashboard;
pub mod pagination;
pub mod school;
pub mod user;

pub use attendance::*;
pub use classroom::*;
pub use common::*;
pub use dashboard::*;
pub use pagination::*;
pub use school::*;
pub use user::*;
