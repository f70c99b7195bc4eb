//! ports - 抽象 trait 层
//!
//! 缓存后端与事件总线的抽象接口，具体实现位于 adapters 与各 core crate

mod cache;
mod event_bus;

pub use cache::*;
pub use event_bus::*;
