//! 需要本地 Kafka：`KAFKA_BROKERS=localhost:9092 cargo test -- --ignored`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quizzler_adapter_kafka::{
    ConsumerConfig, KafkaAdmin, KafkaBusConfig, KafkaConfig, KafkaEventBus, ProducerConfig,
    TopicNamer, TopicSpec,
};
use quizzler_ports::{Delivery, EventBus, EventHandler};
use tokio::sync::mpsc;

struct Forward(mpsc::UnboundedSender<Delivery>);

#[async_trait]
impl EventHandler for Forward {
    async fn handle(&self, delivery: Delivery) {
        let _ = self.0.send(delivery);
    }
}

fn brokers() -> String {
    std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string())
}

#[tokio::test]
#[ignore]
async fn test_publish_reaches_subscriber() {
    let exchange = format!("it-{}", uuid::Uuid::now_v7().simple());
    let config = KafkaBusConfig {
        producer: ProducerConfig::new(brokers()),
        consumer: ConsumerConfig::new(brokers(), format!("{}-cache", exchange)),
        exchange: exchange.clone(),
        max_in_flight: 8,
    };
    let key = "user-service.user.created";

    KafkaAdmin::new(&KafkaConfig::new(brokers()), TopicNamer::new(exchange))
        .unwrap()
        .ensure_topics(&[key], TopicSpec::default())
        .await
        .unwrap();

    let bus = KafkaEventBus::new(&config).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = bus
        .subscribe(&[key.to_string()], Arc::new(Forward(tx)))
        .await
        .unwrap();

    // 等待消费组分配分区
    tokio::time::sleep(Duration::from_secs(5)).await;
    bus.publish(key, br#"{"id":"1"}"#, Duration::from_secs(5))
        .await
        .unwrap();

    let delivery = tokio::time::timeout(Duration::from_secs(20), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.routing_key, key);
    assert_eq!(delivery.payload, br#"{"id":"1"}"#);

    subscription.shutdown().await;
}
