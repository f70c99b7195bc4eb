//! quizzler-config - 配置加载库
//!
//! 启动时加载一次，进程生命周期内不可变。

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use secrecy::Secret;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

/// Redis 配置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Secret<String>,
    /// 所有缓存键的命名空间前缀
    #[serde(default)]
    pub key_prefix: Option<String>,
    /// 建立连接（含握手）的超时
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    /// 单条命令等待响应的超时
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

fn default_connection_timeout_ms() -> u64 {
    5000
}

fn default_response_timeout_ms() -> u64 {
    2000
}

impl RedisConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// 事件总线配置
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    pub brokers: String,
    /// 共享 topic 命名空间（可为空）
    #[serde(default)]
    pub exchange: String,
    /// 持久化消费组名称
    pub queue: String,
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    /// 同时处理中的消息上限
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_publish_timeout_ms() -> u64 {
    5000
}

fn default_max_in_flight() -> usize {
    64
}

impl BusConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

/// 缓存 TTL 配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_user_ttl_secs")]
    pub user_ttl_secs: u64,
    #[serde(default = "default_quiz_ttl_secs")]
    pub quiz_ttl_secs: u64,
}

fn default_user_ttl_secs() -> u64 {
    3600
}

fn default_quiz_ttl_secs() -> u64 {
    1800
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            user_ttl_secs: default_user_ttl_secs(),
            quiz_ttl_secs: default_quiz_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn user_ttl(&self) -> Duration {
        Duration::from_secs(self.user_ttl_secs)
    }

    pub fn quiz_ttl(&self) -> Duration {
        Duration::from_secs(self.quiz_ttl_secs)
    }
}

/// JWT 配置
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
}

fn default_access_ttl_secs() -> u64 {
    900
}

fn default_refresh_ttl_secs() -> u64 {
    604800
}

fn default_issuer() -> String {
    "user-service".to_string()
}

fn default_audience() -> String {
    "quizzler".to_string()
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Prometheus `/metrics` 监听地址；未设置时只安装 recorder
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_addr: None,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    pub redis: RedisConfig,
    pub bus: BusConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_app_env() -> String {
    "development".to_string()
}

impl AppConfig {
    /// 从配置目录和环境变量加载配置
    ///
    /// 优先级：`default.toml` < `<APP_ENV>.toml` < `APP_` 前缀环境变量
    /// （嵌套字段用 `__` 分隔，例如 `APP_REDIS__URL`）。
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| default_app_env());

        let figment = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("APP_").split("__"));

        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否为开发环境
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}

#[cfg(test)]
mod tests;
