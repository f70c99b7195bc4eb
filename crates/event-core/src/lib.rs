//! quizzler-event-core - 事件核心库
//!
//! 路由键语法、事实事件的编解码约定、发布辅助以及内存总线

mod fact_event;
mod in_memory;
mod publisher;
mod routing;

pub use fact_event::*;
pub use in_memory::*;
pub use publisher::*;
pub use routing::*;
