//! quizzler-cache-core - 事件驱动的缓存一致性核心
//!
//! - `KeyedCacheStore`：平铺键与哈希桶寻址的缓存门面，读失败一律按未命中处理
//! - `CacheManager`：路由键 → 缓存变更规则的分发器
//! - `SessionTokenCache`：每个用户一对 access/refresh token
//! - `InMemoryCache`：`CachePort` 的内存实现

mod in_memory;
mod manager;
mod session;
mod store;

pub use in_memory::*;
pub use manager::*;
pub use session::*;
pub use store::*;
