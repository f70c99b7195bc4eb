//! telemetry - 可观测性库

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 人类可读（开发环境）
    Pretty,
    /// JSON（生产环境）
    Json,
}

impl LogFormat {
    pub fn for_env(app_env: &str) -> Self {
        if app_env == "production" {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// 初始化 tracing
pub fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// 按格式初始化 tracing
pub fn init_tracing_with(format: LogFormat, log_level: &str) {
    match format {
        LogFormat::Pretty => init_tracing(log_level),
        LogFormat::Json => init_tracing_json(log_level),
    }
}

/// 初始化 Prometheus metrics recorder
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// 初始化 Prometheus recorder 并在 `addr` 上暴露 `/metrics`
///
/// 需要在 tokio 运行时内调用。
pub fn init_metrics_listener(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_for_env() {
        assert_eq!(LogFormat::for_env("production"), LogFormat::Json);
        assert_eq!(LogFormat::for_env("development"), LogFormat::Pretty);
        assert_eq!(LogFormat::for_env("staging"), LogFormat::Pretty);
    }
}
