//! Event Bus trait 定义

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quizzler_errors::AppResult;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 一条投递到订阅者的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// 路由键，例如 `user-service.user.created`
    pub routing_key: String,
    /// JSON 编码的负载
    pub payload: Vec<u8>,
}

impl Delivery {
    pub fn new(routing_key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            routing_key: routing_key.into(),
            payload: payload.into(),
        }
    }
}

/// 事件处理器
///
/// 投递语义为至少一次，实现必须对重复投递幂等。
/// 处理结果不回传总线：失败只能记录日志。
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, delivery: Delivery);
}

/// 主题路由的发布/订阅总线
#[async_trait]
pub trait EventBus: Send + Sync {
    /// 在 `deadline` 内发布一条消息；总线自身不重试
    async fn publish(&self, routing_key: &str, payload: &[u8], deadline: Duration)
    -> AppResult<()>;

    /// 建立一个绑定到 `topics` 的持久消费者
    ///
    /// 每条投递在独立的任务上处理，慢处理器不会阻塞其它投递。
    async fn subscribe(
        &self,
        topics: &[String],
        handler: Arc<dyn EventHandler>,
    ) -> AppResult<Subscription>;
}

/// 订阅句柄
///
/// 持有监听任务；`shutdown` 取消监听并等待其退出。
/// 句柄被丢弃时监听任务继续运行，直到进程退出。
pub struct Subscription {
    topics: Vec<String>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new(topics: Vec<String>, cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            topics,
            cancel,
            task,
        }
    }

    /// 绑定的路由键
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// 取消令牌（可与外部关闭信号联动）
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 监听任务是否已经退出
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 请求停止监听（不等待）
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 停止监听并等待任务退出
    pub async fn shutdown(self) {
        self.cancel.cancel();
        match self.task.await {
            Ok(()) => info!(topics = ?self.topics, "Subscription stopped"),
            Err(e) => warn!(topics = ?self.topics, error = %e, "Subscription task ended abnormally"),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topics", &self.topics)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_shutdown_stops_listener() {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { token.cancelled().await });

        let subscription = Subscription::new(vec!["a.b.c".to_string()], cancel, task);
        assert_eq!(subscription.topics(), ["a.b.c".to_string()]);
        assert!(!subscription.is_finished());

        subscription.shutdown().await;
    }

    #[test]
    fn test_delivery_new() {
        let delivery = Delivery::new("user-service.user.deleted", br#"{"id":"1"}"#.to_vec());
        assert_eq!(delivery.routing_key, "user-service.user.deleted");
        assert_eq!(delivery.payload, br#"{"id":"1"}"#);
    }
}
