//! Redis 连接管理

use std::time::Duration;

use quizzler_config::RedisConfig;
use quizzler_errors::{AppError, AppResult};
use redis::Client;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use secrecy::ExposeSecret;
use tracing::info;

use crate::RedisCache;

/// 连接与命令超时；Redis 无响应时调用方拿到错误而不是一直挂起
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedisTimeouts {
    pub connection: Duration,
    pub response: Duration,
}

impl Default for RedisTimeouts {
    fn default() -> Self {
        Self {
            connection: Duration::from_secs(5),
            response: Duration::from_secs(2),
        }
    }
}

impl From<&RedisConfig> for RedisTimeouts {
    fn from(config: &RedisConfig) -> Self {
        Self {
            connection: config.connection_timeout(),
            response: config.response_timeout(),
        }
    }
}

/// 创建 Redis 连接管理器
pub async fn create_connection_manager(
    url: &str,
    timeouts: RedisTimeouts,
) -> AppResult<ConnectionManager> {
    let client = Client::open(url)
        .map_err(|e| AppError::cache(format!("Failed to create Redis client: {}", e)))?;

    let manager_config = ConnectionManagerConfig::new()
        .set_connection_timeout(timeouts.connection)
        .set_response_timeout(timeouts.response);

    // 初次连接失败时 ConnectionManager 会按退避重试，整体也受连接超时约束
    tokio::time::timeout(
        timeouts.connection,
        ConnectionManager::new_with_config(client, manager_config),
    )
    .await
    .map_err(|_| AppError::cache("Timed out connecting to Redis"))?
    .map_err(|e| AppError::cache(format!("Failed to create Redis connection manager: {}", e)))
}

/// 检查 Redis 连接
pub async fn check_connection(conn: &mut ConnectionManager) -> AppResult<()> {
    redis::cmd("PING")
        .query_async::<String>(conn)
        .await
        .map_err(|e| AppError::cache(format!("Redis health check failed: {}", e)))?;
    Ok(())
}

/// 按配置连接并返回缓存后端
pub async fn connect(config: &RedisConfig) -> AppResult<RedisCache> {
    let mut conn =
        create_connection_manager(config.url.expose_secret(), RedisTimeouts::from(config)).await?;
    check_connection(&mut conn).await?;

    info!(key_prefix = ?config.key_prefix, "Connected to Redis");

    let cache = RedisCache::new(conn);
    Ok(match &config.key_prefix {
        Some(prefix) => cache.with_key_prefix(prefix.clone()),
        None => cache,
    })
}
