//! Kafka 事件总线
//!
//! 发布：路由键映射为 topic，消息 key 为路由键本身，同一路由键落在同一分区，
//! 因而保持发布顺序。
//! 订阅：每次 `subscribe` 创建一个独立的 `StreamConsumer`，加入配置的消费组。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quizzler_errors::{AppError, AppResult};
use quizzler_ports::{Delivery, EventBus, EventHandler, Subscription};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::{ConsumerConfig, KafkaBusConfig, OffsetTracker, TopicNamer};

fn client_config(entries: Vec<(String, String)>) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    for (key, value) in entries {
        client_config.set(&key, &value);
    }
    client_config
}

/// Kafka Event Bus
pub struct KafkaEventBus {
    producer: FutureProducer,
    consumer: ConsumerConfig,
    namer: TopicNamer,
    max_in_flight: usize,
}

impl KafkaEventBus {
    pub fn new(config: &KafkaBusConfig) -> AppResult<Self> {
        let producer: FutureProducer = client_config(config.producer.to_client_config_entries())
            .create()
            .map_err(|e| AppError::event_bus(format!("Failed to create Kafka producer: {}", e)))?;

        info!(
            brokers = %config.producer.base.brokers,
            exchange = %config.exchange,
            group_id = %config.consumer.group_id,
            "Kafka event bus created"
        );

        Ok(Self {
            producer,
            consumer: config.consumer.clone(),
            namer: TopicNamer::new(config.exchange.clone()),
            max_in_flight: config.max_in_flight.max(1),
        })
    }

    pub fn namer(&self) -> &TopicNamer {
        &self.namer
    }

    /// 刷新所有待发送的消息
    pub fn flush(&self, timeout: Duration) {
        if let Err(e) = self.producer.flush(Timeout::After(timeout)) {
            warn!(error = %e, "Kafka producer flush incomplete");
        }
    }
}

#[async_trait]
impl EventBus for KafkaEventBus {
    async fn publish(
        &self,
        routing_key: &str,
        payload: &[u8],
        deadline: Duration,
    ) -> AppResult<()> {
        let topic = self.namer.topic_for(routing_key);
        let record: FutureRecord<'_, str, [u8]> =
            FutureRecord::to(&topic).payload(payload).key(routing_key);

        let send = self.producer.send(record, Timeout::After(deadline));
        match tokio::time::timeout(deadline, send).await {
            Ok(Ok(_)) => {
                debug!(topic = %topic, routing_key, "Message published");
                Ok(())
            }
            Ok(Err((e, _))) => {
                metrics::counter!("kafka_publish_errors_total").increment(1);
                Err(AppError::event_bus(format!(
                    "Failed to publish {}: {}",
                    routing_key, e
                )))
            }
            Err(_) => Err(AppError::event_bus(format!(
                "Publishing {} timed out after {:?}",
                routing_key, deadline
            ))),
        }
    }

    async fn subscribe(
        &self,
        topics: &[String],
        handler: Arc<dyn EventHandler>,
    ) -> AppResult<Subscription> {
        if topics.is_empty() {
            return Err(AppError::validation("Subscription needs at least one topic"));
        }

        let consumer: StreamConsumer = client_config(self.consumer.to_client_config_entries())
            .create()
            .map_err(|e| AppError::event_bus(format!("Failed to create Kafka consumer: {}", e)))?;

        let subscriptions: Vec<String> = topics.iter().map(|t| self.namer.subscription(t)).collect();
        let refs: Vec<&str> = subscriptions.iter().map(String::as_str).collect();
        consumer
            .subscribe(&refs)
            .map_err(|e| AppError::event_bus(format!("Failed to subscribe to topics: {}", e)))?;

        info!(
            group_id = %self.consumer.group_id,
            topics = ?subscriptions,
            "Kafka consumer subscribed"
        );

        let cancel = CancellationToken::new();
        let listener = Listener {
            consumer: Arc::new(consumer),
            namer: self.namer.clone(),
            handler,
            permits: Arc::new(Semaphore::new(self.max_in_flight)),
            offsets: Arc::new(OffsetTracker::new()),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(listener.run());

        Ok(Subscription::new(topics.to_vec(), cancel, task))
    }
}

struct Listener {
    consumer: Arc<StreamConsumer>,
    namer: TopicNamer,
    handler: Arc<dyn EventHandler>,
    permits: Arc<Semaphore>,
    offsets: Arc<OffsetTracker>,
    cancel: CancellationToken,
}

impl Listener {
    async fn run(self) {
        let workers = TaskTracker::new();

        loop {
            // 先拿到处理名额再拉取，处理中的消息数不超过上限
            let permit = tokio::select! {
                _ = self.cancel.cancelled() => break,
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let received = tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = self.consumer.recv() => received,
            };

            let message = match received {
                Ok(message) => message,
                Err(e) => {
                    metrics::counter!("kafka_receive_errors_total").increment(1);
                    warn!(error = %e, "Kafka receive error");
                    continue;
                }
            };

            let topic = message.topic().to_string();
            let partition = message.partition();
            let offset = message.offset();
            let payload = message.payload().map(<[u8]>::to_vec).unwrap_or_default();
            drop(message);

            self.offsets.begin(&topic, partition, offset);

            let Some(routing_key) = self.namer.routing_key(&topic).map(str::to_string) else {
                warn!(topic = %topic, "Message from foreign topic, skipping");
                self.store(&topic, partition, offset);
                continue;
            };

            let handler = self.handler.clone();
            let consumer = self.consumer.clone();
            let offsets = self.offsets.clone();
            workers.spawn(async move {
                handler.handle(Delivery::new(routing_key, payload)).await;
                metrics::counter!("kafka_messages_consumed_total", "topic" => topic.clone())
                    .increment(1);
                if let Some(safe) = offsets.complete(&topic, partition, offset) {
                    if let Err(e) = consumer.store_offset(&topic, partition, safe) {
                        warn!(topic = %topic, partition, offset = safe, error = %e, "Failed to store offset");
                    }
                }
                drop(permit);
            });
        }

        workers.close();
        workers.wait().await;

        if let Err(e) = self.consumer.commit_consumer_state(CommitMode::Sync) {
            debug!(error = %e, "No offsets committed on shutdown");
        }
        self.consumer.unsubscribe();
        info!("Kafka listener stopped");
    }

    fn store(&self, topic: &str, partition: i32, offset: i64) {
        if let Some(safe) = self.offsets.complete(topic, partition, offset) {
            if let Err(e) = self.consumer.store_offset(topic, partition, safe) {
                warn!(topic, partition, offset = safe, error = %e, "Failed to store offset");
            }
        }
    }
}
