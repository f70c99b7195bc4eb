//! 发布端辅助
//!
//! 处理器在主存储提交成功之后才发布事件。发布失败不会回滚已提交的写入，
//! 对应实体的缓存会一直陈旧到下一次写入或 TTL 过期。

use std::sync::Arc;
use std::time::Duration;

use quizzler_errors::AppResult;
use quizzler_ports::EventBus;
use tracing::{debug, warn};

use crate::FactEvent;

/// 事实事件发布器
#[derive(Clone)]
pub struct FactPublisher {
    bus: Arc<dyn EventBus>,
    deadline: Duration,
}

impl FactPublisher {
    pub fn new(bus: Arc<dyn EventBus>, deadline: Duration) -> Self {
        Self { bus, deadline }
    }

    /// 发布一条事件，失败时返回错误由调用方决定是否致命
    pub async fn publish<E: FactEvent + ?Sized>(&self, event: &E) -> AppResult<()> {
        let routing_key = event.routing_key();
        let payload = event.payload()?;

        match self.bus.publish(routing_key, &payload, self.deadline).await {
            Ok(()) => {
                metrics::counter!("events_published_total", "outcome" => "ok").increment(1);
                debug!(routing_key, bytes = payload.len(), "Fact event published");
                Ok(())
            }
            Err(e) => {
                metrics::counter!("events_published_total", "outcome" => "failed").increment(1);
                warn!(
                    routing_key,
                    error = %e,
                    "Failed to publish fact event; cache stays stale until next write or TTL expiry"
                );
                Err(e)
            }
        }
    }

    /// 发布一条事件，失败只记录日志
    pub async fn publish_or_log<E: FactEvent + ?Sized>(&self, event: &E) {
        let _ = self.publish(event).await;
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}
