//! 基础设施资源
//!
//! 统一创建 worker 共享的 Redis 缓存与 Kafka 事件总线

use std::sync::Arc;

use quizzler_adapter_kafka::{KafkaAdmin, KafkaBusConfig, KafkaEventBus, TopicSpec};
use quizzler_adapter_redis::connect;
use quizzler_cache_core::KeyedCacheStore;
use quizzler_config::AppConfig;
use quizzler_errors::AppResult;
use quizzler_event_core::FactPublisher;
use quizzler_ports::{CachePort, EventBus};
use tracing::info;

use crate::retry::{RetryConfig, with_retry};

/// 基础设施资源容器
pub struct Infrastructure {
    config: AppConfig,
    cache: Arc<dyn CachePort>,
    kafka: Arc<KafkaEventBus>,
    bus_config: KafkaBusConfig,
}

impl Infrastructure {
    /// 从配置创建基础设施资源（带重试）
    pub async fn from_config(config: AppConfig) -> AppResult<Self> {
        Self::connect(config, &RetryConfig::default()).await
    }

    pub async fn connect(config: AppConfig, retry: &RetryConfig) -> AppResult<Self> {
        let redis = with_retry(retry, "Redis connection", || connect(&config.redis)).await?;

        let bus_config = KafkaBusConfig::from_bus_config(&config.bus, &config.app_name);
        let kafka = with_retry(retry, "Kafka event bus", || async {
            KafkaEventBus::new(&bus_config)
        })
        .await?;

        info!(
            app_name = %config.app_name,
            exchange = %config.bus.exchange,
            queue = %config.bus.queue,
            "Infrastructure ready"
        );

        Ok(Self {
            config,
            cache: Arc::new(redis),
            kafka: Arc::new(kafka),
            bus_config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> Arc<dyn CachePort> {
        self.cache.clone()
    }

    pub fn store(&self) -> KeyedCacheStore {
        KeyedCacheStore::new(self.cache.clone())
    }

    pub fn event_bus(&self) -> Arc<dyn EventBus> {
        self.kafka.clone()
    }

    /// 使用配置的发布超时作为默认截止时间
    pub fn publisher(&self) -> FactPublisher {
        FactPublisher::new(self.event_bus(), self.config.bus.publish_timeout())
    }

    /// 为字面路由键预先创建 topic
    pub async fn ensure_topics(&self, routing_keys: &[&str]) -> AppResult<()> {
        let admin = KafkaAdmin::new(&self.bus_config.producer.base, self.kafka.namer().clone())?;
        with_retry(&RetryConfig::default(), "Kafka topic provisioning", || {
            admin.ensure_topics(routing_keys, TopicSpec::default())
        })
        .await
    }

    /// 退出前把尚未送达的消息刷出
    pub fn flush(&self) {
        self.kafka.flush(self.config.bus.publish_timeout());
    }
}
