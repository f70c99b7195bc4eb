//! CacheManager - 事件驱动的缓存失效分发
//!
//! 每个服务把自己关心的路由键映射为一组缓存变更：
//!
//! - `Populate`：`*.created` / `*.fetched`，负载即规范实体，直接写入缓存
//! - `InvalidateSingle`：`*.updated` / `*.deleted`，删除实体唯一的缓存地址
//! - `InvalidateFanout`：`*.mutated`，删除实体自身以及负载中关系字段
//!   引用到的每个聚合的列表级缓存
//!
//! 删除与重复删除可交换且幂等，因此乱序和重复投递都能收敛。
//! 单条投递的处理从不向总线返回错误。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quizzler_errors::{AppError, AppResult};
use quizzler_event_core::{Action, RoutedEvent, RoutingKey};
use quizzler_ports::{Delivery, EventBus, EventHandler, Subscription};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::KeyedCacheStore;

/// 缓存策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Populate,
    InvalidateSingle,
    InvalidateFanout,
    Noop,
}

impl CachePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Populate => "populate",
            Self::InvalidateSingle => "invalidate-single",
            Self::InvalidateFanout => "invalidate-fanout",
            Self::Noop => "noop",
        }
    }

    /// 策略是否符合路由键的动作
    ///
    /// `*.deleted` 也允许扇出，关系实体被删除时需要清理关联方。
    /// `Noop` 与自定义动作不受约束。
    pub fn fits(&self, action: &Action) -> bool {
        match (action, self) {
            (_, Self::Noop) | (Action::Other(_), _) => true,
            (Action::Created | Action::Fetched, Self::Populate) => true,
            (Action::Updated | Action::Deleted, Self::InvalidateSingle | Self::InvalidateFanout) => {
                true
            }
            (Action::Mutated, Self::InvalidateFanout) => true,
            _ => false,
        }
    }
}

/// 单个缓存变更
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMutation {
    Set { key: String, value: String },
    SetField { bucket: String, field: String, value: String },
    /// 删除平铺键或整个桶
    Delete { key: String },
    DeleteField { bucket: String, field: String },
}

impl fmt::Display for CacheMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set { key, .. } => write!(f, "SET {}", key),
            Self::SetField { bucket, field, .. } => write!(f, "HSET {} {}", bucket, field),
            Self::Delete { key } => write!(f, "DEL {}", key),
            Self::DeleteField { bucket, field } => write!(f, "HDEL {} {}", bucket, field),
        }
    }
}

/// 一条事件对应的缓存变更计划
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePlan {
    pub policy: CachePolicy,
    pub mutations: Vec<CacheMutation>,
}

impl CachePlan {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            mutations: Vec::new(),
        }
    }

    pub fn populate() -> Self {
        Self::new(CachePolicy::Populate)
    }

    pub fn invalidate_single() -> Self {
        Self::new(CachePolicy::InvalidateSingle)
    }

    pub fn invalidate_fanout() -> Self {
        Self::new(CachePolicy::InvalidateFanout)
    }

    pub fn noop() -> Self {
        Self::new(CachePolicy::Noop)
    }

    pub fn set_json<T: Serialize + ?Sized>(
        mut self,
        key: impl Into<String>,
        value: &T,
    ) -> AppResult<Self> {
        self.mutations.push(CacheMutation::Set {
            key: key.into(),
            value: serde_json::to_string(value)?,
        });
        Ok(self)
    }

    pub fn set_field_json<T: Serialize + ?Sized>(
        mut self,
        bucket: impl Into<String>,
        field: impl Into<String>,
        value: &T,
    ) -> AppResult<Self> {
        self.mutations.push(CacheMutation::SetField {
            bucket: bucket.into(),
            field: field.into(),
            value: serde_json::to_string(value)?,
        });
        Ok(self)
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.mutations.push(CacheMutation::Delete { key: key.into() });
        self
    }

    pub fn delete_field(mut self, bucket: impl Into<String>, field: impl Into<String>) -> Self {
        self.mutations.push(CacheMutation::DeleteField {
            bucket: bucket.into(),
            field: field.into(),
        });
        self
    }

    /// 计划中被删除的所有地址（`bucket` 或 `bucket#field`）
    pub fn invalidated(&self) -> Vec<String> {
        self.mutations
            .iter()
            .filter_map(|m| match m {
                CacheMutation::Delete { key } => Some(key.clone()),
                CacheMutation::DeleteField { bucket, field } => {
                    Some(format!("{}#{}", bucket, field))
                }
                _ => None,
            })
            .collect()
    }
}

/// 一组路由键 → 缓存变更规则
///
/// `plan` 是纯函数，不做 I/O，便于单独测试。
pub trait CacheRules: Send + Sync + 'static {
    type Event: RoutedEvent;

    /// 规则集名称（日志与指标标签）
    fn name(&self) -> &'static str;

    fn plan(&self, event: &Self::Event) -> AppResult<CachePlan>;
}

/// 单条投递的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 计划已执行；`failed` 为执行失败的变更数
    Applied { policy: CachePolicy, failed: usize },
    /// 未知路由键，已忽略
    Unknown,
    /// 负载无法解码，已丢弃
    Malformed,
    /// 规则无法生成计划，已丢弃
    Rejected,
}

impl DispatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Applied { failed: 0, .. } => "applied",
            Self::Applied { .. } => "failed",
            Self::Unknown => "unknown",
            Self::Malformed => "malformed",
            Self::Rejected => "failed",
        }
    }
}

/// 缓存管理器
pub struct CacheManager {
    name: String,
    store: KeyedCacheStore,
    ttl: Duration,
}

impl CacheManager {
    pub fn new(name: impl Into<String>, store: KeyedCacheStore, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            store,
            ttl,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &KeyedCacheStore {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 依次执行计划中的变更
    ///
    /// 单个变更失败只记录日志，其余变更照常执行。返回失败数。
    pub async fn apply(&self, plan: &CachePlan) -> usize {
        let mut failed = 0;
        for mutation in &plan.mutations {
            let result = match mutation {
                CacheMutation::Set { key, value } => self.store.set(key, value, self.ttl).await,
                CacheMutation::SetField {
                    bucket,
                    field,
                    value,
                } => self.store.set_field(bucket, field, value, self.ttl).await,
                CacheMutation::Delete { key } => self.store.delete(key).await,
                CacheMutation::DeleteField { bucket, field } => {
                    self.store.delete_field(bucket, field).await
                }
            };

            if let Err(e) = result {
                failed += 1;
                warn!(
                    manager = %self.name,
                    mutation = %mutation,
                    error = %e,
                    "Cache mutation failed"
                );
            }
        }
        failed
    }

    /// 解码、规划并执行一条投递
    pub async fn dispatch<R: CacheRules>(&self, rules: &R, delivery: &Delivery) -> DispatchOutcome {
        let routing_key = delivery.routing_key.as_str();

        let outcome = match R::Event::decode(routing_key, &delivery.payload) {
            Ok(Some(event)) => match rules.plan(&event) {
                Ok(plan) => {
                    if let Ok(key) = RoutingKey::parse(routing_key) {
                        if !plan.policy.fits(key.action()) {
                            warn!(
                                manager = %self.name,
                                rules = rules.name(),
                                routing_key,
                                action = key.action().as_str(),
                                policy = plan.policy.as_str(),
                                "Cache policy does not match routing key action"
                            );
                        }
                    }
                    let failed = self.apply(&plan).await;
                    debug!(
                        manager = %self.name,
                        rules = rules.name(),
                        routing_key,
                        policy = plan.policy.as_str(),
                        mutations = plan.mutations.len(),
                        failed,
                        "Cache plan applied"
                    );
                    DispatchOutcome::Applied {
                        policy: plan.policy,
                        failed,
                    }
                }
                Err(e) => {
                    error!(
                        manager = %self.name,
                        rules = rules.name(),
                        routing_key,
                        error = %e,
                        "Failed to build cache plan, event dropped"
                    );
                    DispatchOutcome::Rejected
                }
            },
            Ok(None) => {
                warn!(
                    manager = %self.name,
                    rules = rules.name(),
                    routing_key,
                    "Unknown routing key, ignored"
                );
                DispatchOutcome::Unknown
            }
            Err(e) => {
                error!(
                    manager = %self.name,
                    rules = rules.name(),
                    routing_key,
                    error = %e,
                    "Malformed event payload, dropped"
                );
                DispatchOutcome::Malformed
            }
        };

        metrics::counter!(
            "cache_events_total",
            "manager" => self.name.clone(),
            "routing_key" => routing_key.to_string(),
            "outcome" => outcome.label()
        )
        .increment(1);

        outcome
    }

    /// 把规则集注册到总线
    ///
    /// 同一个管理器可以注册多组互不相交的规则，每组是一个独立订阅。
    pub async fn register<R: CacheRules>(
        self: &Arc<Self>,
        bus: &dyn EventBus,
        rules: R,
    ) -> AppResult<Subscription> {
        let mut topics = Vec::with_capacity(R::Event::routing_keys().len());
        for key in R::Event::routing_keys() {
            RoutingKey::parse(key).map_err(|e| AppError::validation(e.to_string()))?;
            topics.push(key.to_string());
        }
        let rules_name = rules.name();

        let handler = Arc::new(RulesHandler {
            manager: self.clone(),
            rules,
        });
        let subscription = bus.subscribe(&topics, handler).await?;

        info!(
            manager = %self.name,
            rules = rules_name,
            topics = ?topics,
            "Cache rules registered"
        );
        Ok(subscription)
    }
}

struct RulesHandler<R> {
    manager: Arc<CacheManager>,
    rules: R,
}

#[async_trait]
impl<R: CacheRules> EventHandler for RulesHandler<R> {
    async fn handle(&self, delivery: Delivery) {
        self.manager.dispatch(&self.rules, &delivery).await;
    }
}
