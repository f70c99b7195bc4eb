//! 内存缓存
//!
//! 行为与 Redis 对齐：平铺键与哈希桶共用一个键空间，类型不符时报
//! `WRONGTYPE`，过期判断使用 tokio 时钟以便测试中暂停/推进时间。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use quizzler_errors::{AppError, AppResult};
use quizzler_ports::CachePort;
use tokio::time::Instant;

enum Value {
    Flat(String),
    Hash(HashMap<String, String>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }
}

fn wrong_type(key: &str) -> AppError {
    AppError::cache(format!(
        "WRONGTYPE operation against key `{}` holding the wrong kind of value",
        key
    ))
}

/// 内存缓存
#[derive(Default)]
pub struct InMemoryCache {
    data: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 未过期的键（用于测试断言）
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .data
            .lock()
            .iter()
            .filter(|(_, e)| !e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// 桶中未过期的字段名（用于测试断言）
    pub fn fields(&self, bucket: &str) -> Vec<String> {
        let data = self.data.lock();
        let mut fields = match data.get(bucket) {
            Some(Entry {
                value: Value::Hash(map),
                expires_at,
            }) if !expires_at.is_some_and(|exp| Instant::now() >= exp) => {
                map.keys().cloned().collect()
            }
            _ => Vec::new(),
        };
        fields.sort();
        fields
    }

    /// 剩余 TTL（用于测试断言）
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let data = self.data.lock();
        let entry = data.get(key).filter(|e| !e.is_expired())?;
        entry
            .expires_at
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }

    fn live<'a>(data: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        if data.get(key).is_some_and(Entry::is_expired) {
            data.remove(key);
        }
        data.get_mut(key)
    }
}

#[async_trait]
impl CachePort for InMemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut data = self.data.lock();
        match Self::live(&mut data, key) {
            Some(Entry {
                value: Value::Flat(v),
                ..
            }) => Ok(Some(v.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        self.data.lock().insert(
            key.to_string(),
            Entry {
                value: Value::Flat(value.to_string()),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.data.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut data = self.data.lock();
        Ok(Self::live(&mut data, key).is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()> {
        let mut data = self.data.lock();
        if let Some(entry) = Self::live(&mut data, key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn hget(&self, bucket: &str, field: &str) -> AppResult<Option<String>> {
        let mut data = self.data.lock();
        match Self::live(&mut data, bucket) {
            Some(Entry {
                value: Value::Hash(map),
                ..
            }) => Ok(map.get(field).cloned()),
            Some(_) => Err(wrong_type(bucket)),
            None => Ok(None),
        }
    }

    async fn hset_with_ttl(
        &self,
        bucket: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> AppResult<()> {
        let mut data = self.data.lock();
        let expires_at = Some(Instant::now() + ttl);

        match Self::live(&mut data, bucket) {
            Some(Entry {
                value: Value::Hash(map),
                expires_at: exp,
            }) => {
                for (field, value) in fields {
                    map.insert(field.clone(), value.clone());
                }
                *exp = expires_at;
            }
            Some(_) => return Err(wrong_type(bucket)),
            None => {
                let map = fields.iter().cloned().collect();
                data.insert(
                    bucket.to_string(),
                    Entry {
                        value: Value::Hash(map),
                        expires_at,
                    },
                );
            }
        }
        Ok(())
    }

    async fn hdel(&self, bucket: &str, field: &str) -> AppResult<()> {
        let mut data = self.data.lock();
        let now_empty = match Self::live(&mut data, bucket) {
            Some(Entry {
                value: Value::Hash(map),
                ..
            }) => {
                map.remove(field);
                map.is_empty()
            }
            Some(_) => return Err(wrong_type(bucket)),
            None => false,
        };
        // 与 Redis 一致：最后一个字段删除后桶也随之消失
        if now_empty {
            data.remove(bucket);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_flat_set_get_delete() {
        let cache = InMemoryCache::new();
        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        // 删除不存在的键不报错
        cache.delete("k").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_flat_ttl_expiry() {
        let cache = InMemoryCache::new();
        cache.set("k", "v", Some(Duration::from_secs(10))).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.exists("k").await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!cache.exists("k").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hash_write_refreshes_bucket_ttl() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(10);
        cache.hset_with_ttl("b", &fields(&[("a", "1")]), ttl).await.unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        cache.hset_with_ttl("b", &fields(&[("c", "3")]), ttl).await.unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        // 第一次写入的字段随桶一起续期
        assert_eq!(cache.hget("b", "a").await.unwrap(), Some("1".to_string()));
        assert_eq!(cache.fields("b"), vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_hdel_last_field_removes_bucket() {
        let cache = InMemoryCache::new();
        cache
            .hset_with_ttl("b", &fields(&[("a", "1")]), Duration::from_secs(60))
            .await
            .unwrap();

        cache.hdel("b", "a").await.unwrap();
        assert!(!cache.exists("b").await.unwrap());
        cache.hdel("b", "a").await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let cache = InMemoryCache::new();
        cache.set("k", "v", None).await.unwrap();

        assert!(cache.hget("k", "f").await.is_err());
        assert!(
            cache
                .hset_with_ttl("k", &fields(&[("f", "1")]), Duration::from_secs(1))
                .await
                .is_err()
        );
    }
}
