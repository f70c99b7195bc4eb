//! Redis Cache 实现

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use quizzler_errors::{AppError, AppResult};
use quizzler_ports::CachePort;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Redis Cache
///
/// `ConnectionManager` 可廉价克隆并自动重连，多个处理任务并发共用。
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    key_prefix: Option<String>,
}

impl RedisCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            key_prefix: None,
        }
    }

    /// 设置键前缀
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    fn key<'a>(&self, key: &'a str) -> Cow<'a, str> {
        prefixed_key(self.key_prefix.as_deref(), key)
    }
}

/// 获取带前缀的键
pub fn prefixed_key<'a>(prefix: Option<&str>, key: &'a str) -> Cow<'a, str> {
    match prefix {
        Some(prefix) if !prefix.is_empty() => Cow::Owned(format!("{}:{}", prefix, key)),
        _ => Cow::Borrowed(key),
    }
}

/// Redis 的过期时间以秒为单位，不足一秒按一秒计
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 { secs + 1 } else { secs.max(1) }
}

fn redis_error(op: &str, e: redis::RedisError) -> AppError {
    AppError::cache(format!("Redis {} failed: {}", op, e))
}

#[async_trait]
impl CachePort for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(self.key(key).as_ref())
            .await
            .map_err(|e| redis_error("get", e))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let key = self.key(key);
        match ttl {
            Some(duration) => conn
                .set_ex(key.as_ref(), value, ttl_secs(duration))
                .await
                .map_err(|e| redis_error("set", e)),
            None => conn
                .set(key.as_ref(), value)
                .await
                .map_err(|e| redis_error("set", e)),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.del(self.key(key).as_ref())
            .await
            .map_err(|e| redis_error("delete", e))
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(self.key(key).as_ref())
            .await
            .map_err(|e| redis_error("exists", e))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.expire(self.key(key).as_ref(), ttl_secs(ttl) as i64)
            .await
            .map_err(|e| redis_error("expire", e))
    }

    async fn hget(&self, bucket: &str, field: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.hget(self.key(bucket).as_ref(), field)
            .await
            .map_err(|e| redis_error("hget", e))
    }

    async fn hset_with_ttl(
        &self,
        bucket: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> AppResult<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let bucket = self.key(bucket);

        // MULTI/EXEC：字段写入与 TTL 刷新要么都生效要么都不生效
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (field, value) in fields {
            pipe.hset(bucket.as_ref(), field, value).ignore();
        }
        pipe.expire(bucket.as_ref(), ttl_secs(ttl) as i64).ignore();

        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| redis_error("hset_with_ttl", e))
    }

    async fn hdel(&self, bucket: &str, field: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.hdel(self.key(bucket).as_ref(), field)
            .await
            .map_err(|e| redis_error("hdel", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_key() {
        assert_eq!(prefixed_key(Some("app"), "hash:user-1"), "app:hash:user-1");
        assert_eq!(prefixed_key(None, "hash:user-1"), "hash:user-1");
        assert_eq!(prefixed_key(Some(""), "a@b.c"), "a@b.c");
    }

    #[test]
    fn test_ttl_rounds_up_to_whole_seconds() {
        assert_eq!(ttl_secs(Duration::from_secs(60)), 60);
        assert_eq!(ttl_secs(Duration::from_millis(1500)), 2);
        assert_eq!(ttl_secs(Duration::from_millis(1)), 1);
        assert_eq!(ttl_secs(Duration::ZERO), 1);
    }
}
