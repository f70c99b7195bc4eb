//! 用户 Repository trait

use async_trait::async_trait;
use quizzler_common::UserId;
use quizzler_errors::AppResult;

use crate::domain::User;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> AppResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// 保存新用户；邮箱已被占用时返回 `Conflict`
    async fn save(&self, user: &User) -> AppResult<()>;

    async fn update(&self, user: &User) -> AppResult<()>;

    /// 删除用户，返回被删除的实体
    async fn delete(&self, id: &UserId) -> AppResult<Option<User>>;
}
