//! User Service Library
//!
//! - `domain`: User 实体与仓储 trait
//! - `application`: 用户事件与读写处理器
//! - `infrastructure`: 用户缓存规则、缓存读路径与内存仓储

pub mod application;
pub mod domain;
pub mod infrastructure;
