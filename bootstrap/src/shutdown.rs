//! Graceful Shutdown

use std::future::Future;

use futures::future::join_all;
use quizzler_ports::Subscription;
use tracing::info;

/// 监听器监管
///
/// 持有进程内所有订阅；关闭时先统一取消，再等待每个监听任务
/// 处理完手上的消息后退出。
#[derive(Debug, Default)]
pub struct ListenerSupervisor {
    subscriptions: Vec<Subscription>,
}

impl ListenerSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, subscription: Subscription) {
        info!(topics = ?subscription.topics(), "Listener registered");
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// 已经意外退出的监听器数量
    pub fn finished(&self) -> usize {
        self.subscriptions.iter().filter(|s| s.is_finished()).count()
    }

    /// 取消并等待所有监听器
    pub async fn shutdown(self) {
        let count = self.subscriptions.len();
        for subscription in &self.subscriptions {
            subscription.cancel();
        }
        join_all(self.subscriptions.into_iter().map(Subscription::shutdown)).await;
        info!(count, "All listeners stopped");
    }

    /// 运行直到 `signal` 完成，然后关闭所有监听器
    pub async fn run_until<F>(self, signal: F)
    where
        F: Future<Output = ()>,
    {
        signal.await;
        self.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quizzler_event_core::InMemoryEventBus;
    use quizzler_ports::{Delivery, EventBus, EventHandler};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    #[async_trait]
    impl EventHandler for Counter {
        async fn handle(&self, _delivery: Delivery) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_shutdown_unbinds_every_listener() {
        let bus = InMemoryEventBus::new();
        let handler = Arc::new(Counter::default());
        let mut supervisor = ListenerSupervisor::new();

        for topic in ["user-service.user.*", "card-quizzler-service.#"] {
            let subscription = bus
                .subscribe(&[topic.to_string()], handler.clone())
                .await
                .unwrap();
            supervisor.add(subscription);
        }
        assert_eq!(supervisor.len(), 2);
        assert_eq!(supervisor.finished(), 0);

        bus.publish("user-service.user.created", b"{}", Duration::from_secs(1))
            .await
            .unwrap();
        bus.settle().await;
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);

        supervisor.shutdown().await;
        assert_eq!(bus.subscription_count(), 0);

        bus.publish("user-service.user.created", b"{}", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_until_signal() {
        let bus = InMemoryEventBus::new();
        let mut supervisor = ListenerSupervisor::new();
        supervisor.add(
            bus.subscribe(
                &["user-service.user.deleted".to_string()],
                Arc::new(Counter::default()),
            )
            .await
            .unwrap(),
        );

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let running = tokio::spawn(supervisor.run_until(async {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        running.await.unwrap();
        assert_eq!(bus.subscription_count(), 0);
    }
}
