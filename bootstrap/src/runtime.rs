//! 服务运行时

use std::net::SocketAddr;

use quizzler_config::AppConfig;
use quizzler_telemetry::{LogFormat, init_metrics, init_metrics_listener, init_tracing_with};
use tracing::{info, warn};

/// 服务运行时配置
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub config_dir: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            config_dir: "config".to_string(),
        }
    }
}

/// 初始化日志与指标
///
/// 指标导出失败不影响 worker 运行，只记录警告。
pub fn init_runtime(config: &AppConfig) {
    init_tracing_with(LogFormat::for_env(&config.app_env), &config.telemetry.log_level);

    match &config.telemetry.metrics_addr {
        Some(addr) => match addr.parse::<SocketAddr>() {
            Ok(addr) => match init_metrics_listener(addr) {
                Ok(()) => info!(%addr, "Prometheus exporter listening"),
                Err(e) => warn!(%addr, error = %e, "Failed to start Prometheus exporter"),
            },
            Err(e) => warn!(addr = %addr, error = %e, "Invalid metrics address"),
        },
        None => {
            if let Err(e) = init_metrics() {
                warn!(error = %e, "Failed to install metrics recorder");
            }
        }
    }

    info!(
        app_name = %config.app_name,
        app_env = %config.app_env,
        "Runtime initialized"
    );
}

/// 等待关闭信号（SIGINT / SIGTERM）
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
