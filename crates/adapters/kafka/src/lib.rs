//! quizzler-adapter-kafka - Kafka 事件总线适配器
//!
//! - 路由键即 topic（可带命名空间前缀），消费组即持久队列
//! - 通配绑定转换为正则订阅
//! - 每条消息在独立任务上处理，处理完成后才存储偏移量

mod admin;
mod bus;
mod config;
mod offsets;
mod topic;

pub use admin::*;
pub use bus::*;
pub use config::*;
pub use offsets::*;
pub use topic::*;
