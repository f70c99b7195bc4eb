//! 会话 Token 缓存
//!
//! 每个用户在 `hash:session-<uid>` 桶中最多保存一对受信任的
//! access/refresh token。新的一对覆盖旧的一对，旧 token 随即失效。
//!
//! 桶的 TTL 取两者中较长者；每个字段额外携带自己的过期时间，
//! 读取时过期的字段按未命中处理。

use std::time::Duration;

use chrono::Utc;
use quizzler_common::UserId;
use quizzler_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::KeyedCacheStore;

pub const ACCESS_TOKEN_FIELD: &str = "access-token";
pub const REFRESH_TOKEN_FIELD: &str = "refresh-token";

/// 会话桶的键
pub fn session_bucket(user_id: &UserId) -> String {
    format!("hash:session-{}", user_id)
}

/// access/refresh token 对
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedToken {
    token: String,
    /// Unix 毫秒
    expires_at: i64,
}

impl CachedToken {
    fn new(token: &str, ttl: Duration) -> Self {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            token: token.to_string(),
            expires_at: Utc::now().timestamp_millis().saturating_add(ttl_ms),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now().timestamp_millis() >= self.expires_at
    }
}

/// 会话 Token 缓存
#[derive(Clone)]
pub struct SessionTokenCache {
    store: KeyedCacheStore,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionTokenCache {
    pub fn new(store: KeyedCacheStore, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            store,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// 写入一对 token，覆盖之前的一对
    pub async fn set_token_pair(&self, user_id: &UserId, pair: &TokenPair) -> AppResult<()> {
        let access = serde_json::to_string(&CachedToken::new(&pair.access_token, self.access_ttl))?;
        let refresh =
            serde_json::to_string(&CachedToken::new(&pair.refresh_token, self.refresh_ttl))?;

        let fields = [
            (ACCESS_TOKEN_FIELD.to_string(), access),
            (REFRESH_TOKEN_FIELD.to_string(), refresh),
        ];
        let bucket_ttl = self.access_ttl.max(self.refresh_ttl);

        self.store
            .set_fields(&session_bucket(user_id), &fields, bucket_ttl)
            .await?;

        debug!(user_id = %user_id, "Token pair cached");
        Ok(())
    }

    /// 当前受信任的 access token；未命中或已过期时返回 `Unauthenticated`
    pub async fn access_token(&self, user_id: &UserId) -> AppResult<String> {
        self.token(user_id, ACCESS_TOKEN_FIELD).await
    }

    /// 当前受信任的 refresh token；未命中或已过期时返回 `Unauthenticated`
    pub async fn refresh_token(&self, user_id: &UserId) -> AppResult<String> {
        self.token(user_id, REFRESH_TOKEN_FIELD).await
    }

    /// 删除用户的整个会话桶
    pub async fn clear_user_data(&self, user_id: &UserId) -> AppResult<()> {
        self.store.delete(&session_bucket(user_id)).await?;
        info!(user_id = %user_id, "Session cleared");
        Ok(())
    }

    async fn token(&self, user_id: &UserId, field: &str) -> AppResult<String> {
        let cached: Option<CachedToken> = self
            .store
            .get_field_json(&session_bucket(user_id), field)
            .await;

        match cached {
            Some(cached) if !cached.is_expired() => Ok(cached.token),
            _ => Err(AppError::unauthenticated(format!(
                "{} not found for user {}",
                field, user_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryCache;
    use std::sync::Arc;

    fn cache(access: Duration, refresh: Duration) -> (Arc<InMemoryCache>, SessionTokenCache) {
        let backend = Arc::new(InMemoryCache::new());
        let store = KeyedCacheStore::new(backend.clone());
        (backend, SessionTokenCache::new(store, access, refresh))
    }

    #[tokio::test]
    async fn test_token_pair_roundtrip() {
        let (_, sessions) = cache(Duration::from_secs(900), Duration::from_secs(86400));
        let user_id = UserId::new();

        sessions
            .set_token_pair(&user_id, &TokenPair::new("a1", "r1"))
            .await
            .unwrap();

        assert_eq!(sessions.access_token(&user_id).await.unwrap(), "a1");
        assert_eq!(sessions.refresh_token(&user_id).await.unwrap(), "r1");
    }

    #[tokio::test]
    async fn test_new_pair_replaces_old() {
        let (_, sessions) = cache(Duration::from_secs(900), Duration::from_secs(86400));
        let user_id = UserId::new();

        sessions
            .set_token_pair(&user_id, &TokenPair::new("a1", "r1"))
            .await
            .unwrap();
        sessions
            .set_token_pair(&user_id, &TokenPair::new("a2", "r2"))
            .await
            .unwrap();

        assert_eq!(sessions.access_token(&user_id).await.unwrap(), "a2");
        assert_eq!(sessions.refresh_token(&user_id).await.unwrap(), "r2");
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthenticated() {
        let (_, sessions) = cache(Duration::from_secs(900), Duration::from_secs(86400));
        let err = sessions.access_token(&UserId::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_access_expires_before_refresh() {
        let (_, sessions) = cache(Duration::from_millis(20), Duration::from_secs(86400));
        let user_id = UserId::new();
        sessions
            .set_token_pair(&user_id, &TokenPair::new("a1", "r1"))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(
            sessions.access_token(&user_id).await,
            Err(AppError::Unauthenticated(_))
        ));
        assert_eq!(sessions.refresh_token(&user_id).await.unwrap(), "r1");
    }

    #[tokio::test]
    async fn test_bucket_ttl_follows_refresh_ttl() {
        let (backend, sessions) = cache(Duration::from_secs(60), Duration::from_secs(3600));
        let user_id = UserId::new();
        sessions
            .set_token_pair(&user_id, &TokenPair::new("a1", "r1"))
            .await
            .unwrap();

        let ttl = backend.ttl(&session_bucket(&user_id)).unwrap();
        assert!(ttl > Duration::from_secs(3500));
    }

    #[tokio::test]
    async fn test_clear_user_data_removes_both_tokens() {
        let (backend, sessions) = cache(Duration::from_secs(900), Duration::from_secs(86400));
        let user_id = UserId::new();
        sessions
            .set_token_pair(&user_id, &TokenPair::new("a1", "r1"))
            .await
            .unwrap();

        sessions.clear_user_data(&user_id).await.unwrap();

        assert!(backend.keys().is_empty());
        assert!(sessions.access_token(&user_id).await.is_err());
        assert!(sessions.refresh_token(&user_id).await.is_err());
    }
}
