//! Card Quizzler Service Library
//!
//! - `domain`: Folder / Module 实体与仓储 trait
//! - `application`: 测验事件与读写处理器
//! - `infrastructure`: 测验缓存规则（含用户删除的跨服务规则）、缓存读路径与内存仓储

pub mod application;
pub mod domain;
pub mod infrastructure;
