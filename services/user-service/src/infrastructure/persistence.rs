//! 内存用户仓储
//!
//! 本地运行与集成测试使用；记录读次数，便于断言缓存命中时没有读主存储。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use quizzler_common::UserId;
use quizzler_errors::{AppError, AppResult};

use crate::domain::{User, UserRepository};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
    reads: AtomicUsize,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累计读次数
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn email_taken(users: &HashMap<UserId, User>, email: &str, except: &UserId) -> bool {
        users.values().any(|u| u.email == email && u.id != *except)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> AppResult<Option<User>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.read().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.read().values().find(|u| u.email == email).cloned())
    }

    async fn save(&self, user: &User) -> AppResult<()> {
        let mut users = self.users.write();
        if Self::email_taken(&users, &user.email, &user.id) {
            return Err(AppError::conflict(format!("Email already in use: {}", user.email)));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> AppResult<()> {
        let mut users = self.users.write();
        if !users.contains_key(&user.id) {
            return Err(AppError::not_found(format!("User not found: {}", user.id)));
        }
        if Self::email_taken(&users, &user.email, &user.id) {
            return Err(AppError::conflict(format!("Email already in use: {}", user.email)));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, id: &UserId) -> AppResult<Option<User>> {
        Ok(self.users.write().remove(id))
    }
}
