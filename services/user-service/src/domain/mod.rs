//! 领域层

pub mod repositories;
pub mod user;

pub use repositories::*;
pub use user::*;
