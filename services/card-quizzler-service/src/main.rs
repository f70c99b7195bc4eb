//! Card Quizzler Service 缓存 worker
//!
//! 订阅本服务的文件夹/模块事实事件，以及用户服务的 `user.deleted`。

use card_quizzler_service::application::{QuizEvent, UserLifecycleEvent};
use card_quizzler_service::infrastructure::register_quiz_cache;
use quizzler_bootstrap::{
    Infrastructure, ListenerSupervisor, RuntimeConfig, init_runtime, shutdown_signal,
};
use quizzler_config::AppConfig;
use quizzler_event_core::RoutedEvent;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let runtime = RuntimeConfig::default();
    let config = AppConfig::load(&runtime.config_dir)?;
    init_runtime(&config);

    let ttl = config.cache.quiz_ttl();
    let infra = Infrastructure::from_config(config).await?;
    infra.ensure_topics(QuizEvent::routing_keys()).await?;
    infra.ensure_topics(UserLifecycleEvent::routing_keys()).await?;

    let mut supervisor = ListenerSupervisor::new();
    for subscription in register_quiz_cache(infra.event_bus().as_ref(), infra.store(), ttl).await? {
        supervisor.add(subscription);
    }
    info!(listeners = supervisor.len(), "Quiz cache worker started");

    supervisor.run_until(shutdown_signal()).await;
    infra.flush();
    info!("Quiz cache worker stopped");
    Ok(())
}
