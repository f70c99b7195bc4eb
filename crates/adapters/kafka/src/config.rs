//! Kafka 配置模块

use std::time::Duration;

use quizzler_config::BusConfig;

/// Kafka 基础配置
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Broker 地址列表
    pub brokers: String,
    /// 客户端 ID
    pub client_id: Option<String>,
    /// 额外配置
    pub extra: Vec<(String, String)>,
}

impl KafkaConfig {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            client_id: None,
            extra: Vec::new(),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    /// 转换为 rdkafka ClientConfig 的配置项
    pub fn to_client_config_entries(&self) -> Vec<(String, String)> {
        let mut entries = vec![("bootstrap.servers".to_string(), self.brokers.clone())];

        if let Some(client_id) = &self.client_id {
            entries.push(("client.id".to_string(), client_id.clone()));
        }

        entries.extend(self.extra.iter().cloned());
        entries
    }
}

/// Producer 配置
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub base: KafkaConfig,
    /// 确认模式：0=不等待，1=leader确认，-1=所有副本确认
    pub acks: i32,
    /// 延迟发送时间（用于批量）
    pub linger_ms: u64,
    /// 单条消息的投递超时
    pub message_timeout: Duration,
}

impl ProducerConfig {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            base: KafkaConfig::new(brokers),
            acks: -1,
            linger_ms: 5,
            message_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.base = self.base.with_client_id(client_id);
        self
    }

    pub fn with_message_timeout(mut self, timeout: Duration) -> Self {
        self.message_timeout = timeout;
        self
    }

    pub fn to_client_config_entries(&self) -> Vec<(String, String)> {
        let mut entries = self.base.to_client_config_entries();

        entries.push(("acks".to_string(), self.acks.to_string()));
        entries.push(("linger.ms".to_string(), self.linger_ms.to_string()));
        entries.push((
            "message.timeout.ms".to_string(),
            self.message_timeout.as_millis().to_string(),
        ));

        entries
    }
}

/// 自动偏移重置策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutoOffsetReset {
    #[default]
    Earliest,
    Latest,
}

impl AutoOffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoOffsetReset::Earliest => "earliest",
            AutoOffsetReset::Latest => "latest",
        }
    }
}

/// Consumer 配置
///
/// 偏移量由监听循环在处理完成后手动存储，再由 librdkafka 周期性提交。
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub base: KafkaConfig,
    /// 消费者组 ID（持久队列）
    pub group_id: String,
    pub auto_offset_reset: AutoOffsetReset,
    /// 自动提交间隔
    pub auto_commit_interval: Duration,
    /// 会话超时
    pub session_timeout: Duration,
    /// 正则订阅时发现新 topic 的间隔
    pub metadata_refresh_interval: Duration,
}

impl ConsumerConfig {
    pub fn new(brokers: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            base: KafkaConfig::new(brokers),
            group_id: group_id.into(),
            auto_offset_reset: AutoOffsetReset::default(),
            auto_commit_interval: Duration::from_secs(5),
            session_timeout: Duration::from_secs(45),
            metadata_refresh_interval: Duration::from_secs(30),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.base = self.base.with_client_id(client_id);
        self
    }

    pub fn with_auto_offset_reset(mut self, reset: AutoOffsetReset) -> Self {
        self.auto_offset_reset = reset;
        self
    }

    pub fn to_client_config_entries(&self) -> Vec<(String, String)> {
        let mut entries = self.base.to_client_config_entries();

        entries.push(("group.id".to_string(), self.group_id.clone()));
        entries.push(("enable.auto.commit".to_string(), "true".to_string()));
        entries.push(("enable.auto.offset.store".to_string(), "false".to_string()));
        entries.push((
            "auto.commit.interval.ms".to_string(),
            self.auto_commit_interval.as_millis().to_string(),
        ));
        entries.push((
            "auto.offset.reset".to_string(),
            self.auto_offset_reset.as_str().to_string(),
        ));
        entries.push((
            "session.timeout.ms".to_string(),
            self.session_timeout.as_millis().to_string(),
        ));
        entries.push((
            "topic.metadata.refresh.interval.ms".to_string(),
            self.metadata_refresh_interval.as_millis().to_string(),
        ));

        entries
    }
}

/// 事件总线配置
#[derive(Debug, Clone)]
pub struct KafkaBusConfig {
    pub producer: ProducerConfig,
    pub consumer: ConsumerConfig,
    /// topic 命名空间前缀（可为空）
    pub exchange: String,
    /// 单个订阅同时处理中的消息上限
    pub max_in_flight: usize,
}

impl KafkaBusConfig {
    /// 由应用配置构建；`client_id` 通常取服务名
    pub fn from_bus_config(config: &BusConfig, client_id: &str) -> Self {
        Self {
            producer: ProducerConfig::new(&config.brokers)
                .with_client_id(format!("{}-producer", client_id))
                .with_message_timeout(config.publish_timeout()),
            consumer: ConsumerConfig::new(&config.brokers, &config.queue)
                .with_client_id(format!("{}-consumer", client_id)),
            exchange: config.exchange.clone(),
            max_in_flight: config.max_in_flight.max(1),
        }
    }
}
