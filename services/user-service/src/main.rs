//! User Service 缓存 worker
//!
//! 订阅 `user-service.user.*` 事实事件，维护用户缓存与会话桶的一致性。

use quizzler_bootstrap::{
    Infrastructure, ListenerSupervisor, RuntimeConfig, init_runtime, shutdown_signal,
};
use quizzler_config::AppConfig;
use quizzler_event_core::RoutedEvent;
use tracing::info;
use user_service::application::UserEvent;
use user_service::infrastructure::register_user_cache;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let runtime = RuntimeConfig::default();
    let config = AppConfig::load(&runtime.config_dir)?;
    init_runtime(&config);

    let ttl = config.cache.user_ttl();
    let infra = Infrastructure::from_config(config).await?;
    infra.ensure_topics(UserEvent::routing_keys()).await?;

    let mut supervisor = ListenerSupervisor::new();
    supervisor.add(register_user_cache(infra.event_bus().as_ref(), infra.store(), ttl).await?);
    info!(listeners = supervisor.len(), "User cache worker started");

    supervisor.run_until(shutdown_signal()).await;
    infra.flush();
    info!("User cache worker stopped");
    Ok(())
}
