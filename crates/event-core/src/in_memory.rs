//! 内存事件总线
//!
//! 与 `EventBus` 的语义保持一致：每个订阅一条队列、按主题模式绑定、
//! 队列内先进先出投递、每条投递在独立任务上处理。
//! 用于测试与单进程部署。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use quizzler_errors::{AppError, AppResult};
use quizzler_ports::{Delivery, EventBus, EventHandler, Subscription};
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::topic_matches;

struct Binding {
    id: u64,
    patterns: Vec<String>,
    sender: mpsc::UnboundedSender<Delivery>,
}

#[derive(Default)]
struct Inner {
    bindings: Mutex<Vec<Binding>>,
    published: Mutex<Vec<Delivery>>,
    next_id: AtomicU64,
    /// 已入队但尚未处理完的投递数
    pending: AtomicUsize,
    idle: Notify,
    fail_next: AtomicBool,
}

impl Inner {
    fn complete_one(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn unbind(&self, id: u64) {
        self.bindings.lock().retain(|b| b.id != id);
    }
}

/// 处理完成（包括 panic）时归还计数
struct PendingGuard(Arc<Inner>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.complete_one();
    }
}

/// 内存事件总线
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    inner: Arc<Inner>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有成功发布的消息（用于测试）
    pub fn published(&self) -> Vec<Delivery> {
        self.inner.published.lock().clone()
    }

    /// 所有成功发布的路由键（用于测试）
    pub fn published_keys(&self) -> Vec<String> {
        self.inner
            .published
            .lock()
            .iter()
            .map(|d| d.routing_key.clone())
            .collect()
    }

    /// 清空发布记录（用于测试）
    pub fn clear_published(&self) {
        self.inner.published.lock().clear();
    }

    /// 让下一次发布失败（用于测试发布失败路径）
    pub fn fail_next_publish(&self) {
        self.inner.fail_next.store(true, Ordering::SeqCst);
    }

    /// 当前活跃的订阅数
    pub fn subscription_count(&self) -> usize {
        self.inner.bindings.lock().len()
    }

    /// 等待所有已入队的投递处理完毕
    pub async fn settle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(
        &self,
        routing_key: &str,
        payload: &[u8],
        _deadline: Duration,
    ) -> AppResult<()> {
        if self.inner.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AppError::event_bus(format!(
                "simulated publish failure for {}",
                routing_key
            )));
        }

        let delivery = Delivery::new(routing_key, payload);
        self.inner.published.lock().push(delivery.clone());

        let mut queued = 0usize;
        {
            let bindings = self.inner.bindings.lock();
            for binding in bindings.iter() {
                if !binding.patterns.iter().any(|p| topic_matches(p, routing_key)) {
                    continue;
                }
                self.inner.pending.fetch_add(1, Ordering::SeqCst);
                if binding.sender.send(delivery.clone()).is_err() {
                    // 监听已退出，消息丢失
                    self.inner.complete_one();
                } else {
                    queued += 1;
                }
            }
        }

        debug!(routing_key, queued, "Message published in memory");
        Ok(())
    }

    async fn subscribe(
        &self,
        topics: &[String],
        handler: Arc<dyn EventHandler>,
    ) -> AppResult<Subscription> {
        if topics.is_empty() {
            return Err(AppError::validation("subscription requires at least one topic"));
        }

        let (sender, mut receiver) = mpsc::unbounded_channel::<Delivery>();
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.bindings.lock().push(Binding {
            id,
            patterns: topics.to_vec(),
            sender,
        });

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let inner = self.inner.clone();

        let task = tokio::spawn(async move {
            let workers = TaskTracker::new();

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    next = receiver.recv() => match next {
                        Some(delivery) => {
                            let handler = handler.clone();
                            let guard = PendingGuard(inner.clone());
                            workers.spawn(async move {
                                let _guard = guard;
                                handler.handle(delivery).await;
                            });
                        }
                        None => break,
                    },
                }
            }

            inner.unbind(id);
            receiver.close();
            while receiver.try_recv().is_ok() {
                inner.complete_one();
            }

            workers.close();
            workers.wait().await;
        });

        info!(topics = ?topics, "Subscribed to in-memory bus");
        Ok(Subscription::new(topics.to_vec(), cancel, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Delivery>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, delivery: Delivery) {
            self.seen.lock().push(delivery);
        }
    }

    impl Recorder {
        fn keys(&self) -> Vec<String> {
            let mut keys: Vec<String> =
                self.seen.lock().iter().map(|d| d.routing_key.clone()).collect();
            keys.sort();
            keys
        }
    }

    fn topics(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    const DEADLINE: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_delivers_only_bound_keys() {
        let bus = InMemoryEventBus::new();
        let recorder = Arc::new(Recorder::default());
        let _sub = bus
            .subscribe(&topics(&["user-service.user.created"]), recorder.clone())
            .await
            .unwrap();

        bus.publish("user-service.user.created", b"{}", DEADLINE).await.unwrap();
        bus.publish("user-service.user.deleted", b"{}", DEADLINE).await.unwrap();
        bus.settle().await;

        assert_eq!(recorder.keys(), vec!["user-service.user.created".to_string()]);
        assert_eq!(bus.published().len(), 2);
    }

    #[tokio::test]
    async fn test_each_subscription_gets_its_own_copy() {
        let bus = InMemoryEventBus::new();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let _a = bus.subscribe(&topics(&["user-service.#"]), first.clone()).await.unwrap();
        let _b = bus
            .subscribe(&topics(&["user-service.user.deleted"]), second.clone())
            .await
            .unwrap();

        bus.publish("user-service.user.deleted", b"{}", DEADLINE).await.unwrap();
        bus.settle().await;

        assert_eq!(first.keys().len(), 1);
        assert_eq!(second.keys().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_unbinds() {
        let bus = InMemoryEventBus::new();
        let recorder = Arc::new(Recorder::default());
        let sub = bus.subscribe(&topics(&["a.b.c"]), recorder.clone()).await.unwrap();
        assert_eq!(bus.subscription_count(), 1);

        sub.shutdown().await;
        assert_eq!(bus.subscription_count(), 0);

        bus.publish("a.b.c", b"{}", DEADLINE).await.unwrap();
        bus.settle().await;
        assert!(recorder.keys().is_empty());
    }

    #[tokio::test]
    async fn test_fail_next_publish_only_fails_once() {
        let bus = InMemoryEventBus::new();
        bus.fail_next_publish();

        assert!(bus.publish("a.b.c", b"{}", DEADLINE).await.is_err());
        assert!(bus.publish("a.b.c", b"{}", DEADLINE).await.is_ok());
        assert_eq!(bus.published_keys(), vec!["a.b.c".to_string()]);
    }

    #[tokio::test]
    async fn test_subscribe_requires_topics() {
        let bus = InMemoryEventBus::new();
        let recorder = Arc::new(Recorder::default());
        assert!(bus.subscribe(&[], recorder).await.is_err());
    }

    #[tokio::test]
    async fn test_settle_without_subscribers_returns() {
        let bus = InMemoryEventBus::new();
        bus.publish("a.b.c", b"{}", DEADLINE).await.unwrap();
        bus.settle().await;
    }
}
