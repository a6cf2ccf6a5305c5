pub mod postmark;

pub use postmark::*;
