//! 缓存门面
//!
//! 读路径失败开放：后端错误与未命中对调用方不可区分，
//! 一律回落到主存储。写路径返回错误，由调用方决定是否忽略。

use std::sync::Arc;
use std::time::Duration;

use quizzler_errors::AppResult;
use quizzler_ports::CachePort;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// 平铺键 + 哈希桶寻址的缓存
#[derive(Clone)]
pub struct KeyedCacheStore {
    backend: Arc<dyn CachePort>,
}

impl KeyedCacheStore {
    pub fn new(backend: Arc<dyn CachePort>) -> Self {
        Self { backend }
    }

    /// 读取平铺键；未命中或后端失败返回 `None`
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(Some(value)) => {
                record_lookup("hit");
                Some(value)
            }
            Ok(None) => {
                record_lookup("miss");
                None
            }
            Err(e) => {
                record_lookup("error");
                warn!(key, error = %e, "Cache get failed, treating as miss");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.backend.set(key, value, Some(ttl)).await
    }

    /// 读取桶中字段；未命中或后端失败返回 `None`
    pub async fn get_field(&self, bucket: &str, field: &str) -> Option<String> {
        match self.backend.hget(bucket, field).await {
            Ok(Some(value)) => {
                record_lookup("hit");
                Some(value)
            }
            Ok(None) => {
                record_lookup("miss");
                None
            }
            Err(e) => {
                record_lookup("error");
                warn!(bucket, field, error = %e, "Cache hget failed, treating as miss");
                None
            }
        }
    }

    /// 写入字段并刷新桶 TTL（单个原子批次）
    pub async fn set_field(
        &self,
        bucket: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> AppResult<()> {
        self.backend
            .hset_with_ttl(bucket, &[(field.to_string(), value.to_string())], ttl)
            .await
    }

    /// 一次写入多个字段并刷新桶 TTL（单个原子批次）
    pub async fn set_fields(
        &self,
        bucket: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> AppResult<()> {
        self.backend.hset_with_ttl(bucket, fields, ttl).await
    }

    /// 删除平铺键或整个桶
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        self.backend.delete(key).await
    }

    pub async fn delete_field(&self, bucket: &str, field: &str) -> AppResult<()> {
        self.backend.hdel(bucket, field).await
    }

    /// 读取并解码 JSON；无法解码的缓存内容按未命中处理并被清除
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Evicting undecodable cache entry");
                if let Err(e) = self.delete(key).await {
                    warn!(key, error = %e, "Failed to evict cache entry");
                }
                None
            }
        }
    }

    /// 读取并解码桶中字段；无法解码的字段按未命中处理并被清除
    pub async fn get_field_json<T: DeserializeOwned>(&self, bucket: &str, field: &str) -> Option<T> {
        let raw = self.get_field(bucket, field).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(bucket, field, error = %e, "Evicting undecodable cache field");
                if let Err(e) = self.delete_field(bucket, field).await {
                    warn!(bucket, field, error = %e, "Failed to evict cache field");
                }
                None
            }
        }
    }

    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, ttl).await
    }

    pub async fn set_field_json<T: Serialize + ?Sized>(
        &self,
        bucket: &str,
        field: &str,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set_field(bucket, field, &raw, ttl).await
    }
}

fn record_lookup(result: &'static str) {
    metrics::counter!("cache_lookups_total", "result" => result).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryCache;
    use async_trait::async_trait;
    use mockall::mock;
    use quizzler_errors::AppError;
    use serde::Deserialize;

    mock! {
        pub Backend {}

        #[async_trait]
        impl CachePort for Backend {
            async fn get(&self, key: &str) -> AppResult<Option<String>>;
            async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;
            async fn delete(&self, key: &str) -> AppResult<()>;
            async fn exists(&self, key: &str) -> AppResult<bool>;
            async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()>;
            async fn hget(&self, bucket: &str, field: &str) -> AppResult<Option<String>>;
            async fn hset_with_ttl(
                &self,
                bucket: &str,
                fields: &[(String, String)],
                ttl: Duration,
            ) -> AppResult<()>;
            async fn hdel(&self, bucket: &str, field: &str) -> AppResult<()>;
        }
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Card {
        id: u32,
        title: String,
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_backend_error_reads_as_miss() {
        let mut backend = MockBackend::new();
        backend
            .expect_get()
            .returning(|_| Err(AppError::cache("connection reset")));
        backend
            .expect_hget()
            .returning(|_, _| Err(AppError::cache("timeout")));

        let store = KeyedCacheStore::new(Arc::new(backend));
        assert_eq!(store.get("user@example.com").await, None);
        assert_eq!(store.get_field("hash:user-1", "user").await, None);
    }

    #[tokio::test]
    async fn test_backend_write_error_is_returned() {
        let mut backend = MockBackend::new();
        backend
            .expect_hset_with_ttl()
            .returning(|_, _, _| Err(AppError::cache("READONLY")));

        let store = KeyedCacheStore::new(Arc::new(backend));
        let result = store.set_field("hash:user-1", "user", "{}", TTL).await;
        assert!(matches!(result, Err(AppError::Cache(_))));
    }

    #[tokio::test]
    async fn test_set_field_is_one_batch() {
        let mut backend = MockBackend::new();
        backend
            .expect_hset_with_ttl()
            .withf(|bucket, fields, ttl| {
                bucket == "b" && fields.len() == 1 && fields[0].0 == "f" && *ttl == TTL
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let store = KeyedCacheStore::new(Arc::new(backend));
        store.set_field("b", "f", "v", TTL).await.unwrap();
    }

    #[tokio::test]
    async fn test_json_roundtrip_through_field() {
        let store = KeyedCacheStore::new(Arc::new(InMemoryCache::new()));
        let card = Card {
            id: 1,
            title: "Ser vs Estar".to_string(),
        };

        store.set_field_json("hash:c", "card:1", &card, TTL).await.unwrap();
        let cached: Option<Card> = store.get_field_json("hash:c", "card:1").await;
        assert_eq!(cached, Some(card));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_evicted() {
        let backend = Arc::new(InMemoryCache::new());
        let store = KeyedCacheStore::new(backend.clone());
        store.set("k", "not-json", TTL).await.unwrap();

        let cached: Option<Card> = store.get_json("k").await;
        assert_eq!(cached, None);
        assert!(!backend.exists("k").await.unwrap());
    }
}
