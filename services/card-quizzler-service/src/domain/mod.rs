//! 领域层

pub mod folder;
pub mod ids;
pub mod module;
pub mod repositories;

pub use folder::*;
pub use ids::*;
pub use module::*;
pub use repositories::*;
