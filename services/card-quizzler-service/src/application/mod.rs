//! 应用层

pub mod events;
pub mod service;

pub use events::*;
pub use service::*;
