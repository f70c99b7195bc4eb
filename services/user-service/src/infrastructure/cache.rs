//! 用户缓存
//!
//! 键布局：
//! - `hash:user-<id>` 桶，字段 `user`
//! - 平铺键 `<email>`，值同样是完整的用户 JSON

use std::sync::Arc;
use std::time::Duration;

use quizzler_cache_core::{CacheManager, CachePlan, CacheRules, KeyedCacheStore, session_bucket};
use quizzler_common::UserId;
use quizzler_errors::AppResult;
use quizzler_ports::{EventBus, Subscription};

use crate::application::UserEvent;
use crate::domain::User;

pub const USER_FIELD: &str = "user";

pub fn user_bucket(id: &UserId) -> String {
    format!("hash:user-{}", id)
}

/// 用户缓存规则
#[derive(Debug, Clone, Copy, Default)]
pub struct UserCacheRules;

impl CacheRules for UserCacheRules {
    type Event = UserEvent;

    fn name(&self) -> &'static str {
        "user"
    }

    fn plan(&self, event: &UserEvent) -> AppResult<CachePlan> {
        match event {
            UserEvent::Created(user) | UserEvent::Fetched(user) => CachePlan::populate()
                .set_field_json(user_bucket(&user.id), USER_FIELD, user)?
                .set_json(user.email.clone(), user),
            UserEvent::Updated(updated) => {
                let user = &updated.user;
                let mut plan = CachePlan::invalidate_single()
                    .delete_field(user_bucket(&user.id), USER_FIELD)
                    .delete(user.email.clone());
                if let Some(previous) = &updated.previous_email {
                    plan = plan.delete(previous.clone());
                }
                Ok(plan)
            }
            UserEvent::Deleted(reference) => {
                let mut plan = CachePlan::invalidate_single()
                    .delete(user_bucket(&reference.id))
                    .delete(session_bucket(&reference.id));
                if let Some(email) = &reference.email {
                    plan = plan.delete(email.clone());
                }
                Ok(plan)
            }
        }
    }
}

/// 读路径缓存视图
#[derive(Clone)]
pub struct UserCache {
    store: KeyedCacheStore,
}

impl UserCache {
    pub fn new(store: KeyedCacheStore) -> Self {
        Self { store }
    }

    pub async fn get_by_id(&self, id: &UserId) -> Option<User> {
        self.store.get_field_json(&user_bucket(id), USER_FIELD).await
    }

    pub async fn get_by_email(&self, email: &str) -> Option<User> {
        self.store.get_json(email).await
    }
}

/// 创建用户缓存管理器并注册到总线
pub async fn register_user_cache(
    bus: &dyn EventBus,
    store: KeyedCacheStore,
    ttl: Duration,
) -> AppResult<Subscription> {
    let manager = Arc::new(CacheManager::new("user-cache", store, ttl));
    manager.register(bus, UserCacheRules).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizzler_cache_core::{CacheMutation, CachePolicy};

    use crate::application::{UserRef, UserUpdated};

    fn user() -> User {
        User::new("ada@example.com", "ada").unwrap()
    }

    #[test]
    fn test_created_populates_bucket_and_email_key() {
        let user = user();
        let plan = UserCacheRules.plan(&UserEvent::Created(user.clone())).unwrap();

        assert_eq!(plan.policy, CachePolicy::Populate);
        assert_eq!(plan.mutations.len(), 2);
        assert!(matches!(
            &plan.mutations[0],
            CacheMutation::SetField { bucket, field, .. }
                if *bucket == user_bucket(&user.id) && field == USER_FIELD
        ));
        assert!(matches!(
            &plan.mutations[1],
            CacheMutation::Set { key, .. } if key == "ada@example.com"
        ));
    }

    #[test]
    fn test_updated_invalidates_current_and_previous_email() {
        let user = user();
        let plan = UserCacheRules
            .plan(&UserEvent::Updated(UserUpdated {
                user: user.clone(),
                previous_email: Some("old@example.com".to_string()),
            }))
            .unwrap();

        assert_eq!(plan.policy, CachePolicy::InvalidateSingle);
        let invalidated = plan.invalidated();
        assert!(invalidated.contains(&format!("{}#{}", user_bucket(&user.id), USER_FIELD)));
        assert!(invalidated.contains(&"ada@example.com".to_string()));
        assert!(invalidated.contains(&"old@example.com".to_string()));
    }

    #[test]
    fn test_deleted_also_drops_the_session() {
        let id = UserId::new();
        let plan = UserCacheRules
            .plan(&UserEvent::Deleted(UserRef { id, email: None }))
            .unwrap();

        assert_eq!(
            plan.invalidated(),
            vec![user_bucket(&id), session_bucket(&id)]
        );
    }
}
