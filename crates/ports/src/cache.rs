//! Cache trait 定义

use async_trait::async_trait;
use quizzler_errors::AppResult;
use std::time::Duration;

/// 缓存后端 trait
///
/// 支持两种寻址：平铺键（key → value）与哈希桶（bucket → field → value）。
/// 同一个桶内所有字段共享一个 TTL。实现不得在进程内保留副本。
#[async_trait]
pub trait CachePort: Send + Sync {
    /// 获取缓存值
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// 设置缓存值
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;

    /// 删除缓存（键不存在时也返回成功）
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// 检查是否存在
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// 设置过期时间
    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()>;

    /// 获取哈希桶中的字段
    async fn hget(&self, bucket: &str, field: &str) -> AppResult<Option<String>>;

    /// 原子地写入一个或多个字段并刷新桶的 TTL
    ///
    /// 字段写入与 TTL 刷新必须在同一批次内完成，
    /// 桶的过期时间不会早于其第一个字段出现。
    async fn hset_with_ttl(
        &self,
        bucket: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> AppResult<()>;

    /// 删除哈希桶中的字段（字段不存在时也返回成功）
    async fn hdel(&self, bucket: &str, field: &str) -> AppResult<()>;
}
