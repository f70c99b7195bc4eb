//! 用户读写处理器
//!
//! 写：先提交主存储，再发布事实事件，发布失败不回滚。
//! 读：先查缓存，未命中回落主存储并发布 `user.fetched` 由缓存 worker 回填。

use std::sync::Arc;

use quizzler_common::UserId;
use quizzler_errors::{AppError, AppResult};
use quizzler_event_core::FactPublisher;
use tracing::{debug, info};

use crate::application::{UserEvent, UserRef, UserUpdated};
use crate::domain::{User, UserChanges, UserRepository};
use crate::infrastructure::UserCache;

pub struct UserService {
    repo: Arc<dyn UserRepository>,
    cache: UserCache,
    publisher: FactPublisher,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, cache: UserCache, publisher: FactPublisher) -> Self {
        Self {
            repo,
            cache,
            publisher,
        }
    }

    pub async fn create(&self, email: &str, username: &str) -> AppResult<User> {
        let user = User::new(email, username)?;
        self.repo.save(&user).await?;
        info!(user_id = %user.id, "User created");

        self.publisher
            .publish_or_log(&UserEvent::Created(user.clone()))
            .await;
        Ok(user)
    }

    pub async fn update(&self, id: &UserId, changes: UserChanges) -> AppResult<User> {
        let mut user = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User not found: {}", id)))?;

        let previous_email = user.apply(changes)?;
        self.repo.update(&user).await?;
        info!(user_id = %user.id, email_changed = previous_email.is_some(), "User updated");

        self.publisher
            .publish_or_log(&UserEvent::Updated(UserUpdated {
                user: user.clone(),
                previous_email,
            }))
            .await;
        Ok(user)
    }

    pub async fn delete(&self, id: &UserId) -> AppResult<()> {
        let user = self
            .repo
            .delete(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User not found: {}", id)))?;
        info!(user_id = %user.id, "User deleted");

        self.publisher
            .publish_or_log(&UserEvent::Deleted(UserRef {
                id: user.id,
                email: Some(user.email),
            }))
            .await;
        Ok(())
    }

    pub async fn get_by_id(&self, id: &UserId) -> AppResult<User> {
        if let Some(user) = self.cache.get_by_id(id).await {
            debug!(user_id = %id, "User served from cache");
            return Ok(user);
        }

        let user = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User not found: {}", id)))?;
        self.publish_fetched(&user).await;
        Ok(user)
    }

    pub async fn get_by_email(&self, email: &str) -> AppResult<User> {
        if let Some(user) = self.cache.get_by_email(email).await {
            debug!(user_id = %user.id, "User served from cache");
            return Ok(user);
        }

        let user = self
            .repo
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User not found: {}", email)))?;
        self.publish_fetched(&user).await;
        Ok(user)
    }

    async fn publish_fetched(&self, user: &User) {
        self.publisher
            .publish_or_log(&UserEvent::Fetched(user.clone()))
            .await;
    }
}
