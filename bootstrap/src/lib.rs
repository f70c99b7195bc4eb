//! quizzler-bootstrap - 缓存 worker 启动骨架
//!
//! 各服务的 worker 复用的启动逻辑：配置、日志、连接基础设施、
//! 监听器监管与优雅退出

mod infrastructure;
mod retry;
mod runtime;
mod shutdown;

pub use infrastructure::*;
pub use retry::*;
pub use runtime::*;
pub use shutdown::*;
