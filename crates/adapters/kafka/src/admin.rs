//! Topic 预创建
//!
//! 正则订阅只会匹配已存在的 topic，缓存 worker 启动时为自己
//! 绑定的字面路由键预先创建 topic。

use std::time::Duration;

use quizzler_errors::{AppError, AppResult};
use quizzler_event_core::is_wildcard;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::RDKafkaErrorCode;
use tracing::{debug, info, warn};

use crate::{KafkaConfig, TopicNamer};

/// Topic 配置
#[derive(Debug, Clone, Copy)]
pub struct TopicSpec {
    /// 分区数量
    pub num_partitions: i32,
    /// 副本因子
    pub replication_factor: i32,
}

impl Default for TopicSpec {
    fn default() -> Self {
        Self {
            num_partitions: 3,
            replication_factor: 1,
        }
    }
}

/// Kafka Admin 客户端
pub struct KafkaAdmin {
    admin: AdminClient<DefaultClientContext>,
    namer: TopicNamer,
    timeout: Duration,
}

impl KafkaAdmin {
    pub fn new(config: &KafkaConfig, namer: TopicNamer) -> AppResult<Self> {
        let mut client_config = ClientConfig::new();
        for (key, value) in config.to_client_config_entries() {
            client_config.set(&key, &value);
        }

        let admin: AdminClient<DefaultClientContext> = client_config
            .create()
            .map_err(|e| AppError::event_bus(format!("Failed to create admin client: {}", e)))?;

        Ok(Self {
            admin,
            namer,
            timeout: Duration::from_secs(30),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 为字面路由键创建 topic；已存在的 topic 与通配模式被跳过
    pub async fn ensure_topics(&self, routing_keys: &[&str], spec: TopicSpec) -> AppResult<()> {
        let names: Vec<String> = routing_keys
            .iter()
            .filter(|key| !is_wildcard(key))
            .map(|key| self.namer.topic_for(key))
            .collect();
        if names.is_empty() {
            return Ok(());
        }

        let new_topics: Vec<NewTopic<'_>> = names
            .iter()
            .map(|name| {
                NewTopic::new(
                    name,
                    spec.num_partitions,
                    TopicReplication::Fixed(spec.replication_factor),
                )
            })
            .collect();

        let opts = AdminOptions::new().operation_timeout(Some(self.timeout));

        let results = self
            .admin
            .create_topics(&new_topics, &opts)
            .await
            .map_err(|e| AppError::event_bus(format!("Failed to create topics: {}", e)))?;

        for result in results {
            match result {
                Ok(name) => info!(topic = %name, "Topic created"),
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    debug!(topic = %name, "Topic already exists")
                }
                Err((name, err)) => {
                    warn!(topic = %name, error = ?err, "Failed to create topic");
                    return Err(AppError::event_bus(format!(
                        "Failed to create topic {}: {:?}",
                        name, err
                    )));
                }
            }
        }

        Ok(())
    }
}
