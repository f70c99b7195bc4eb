//! 测验 Repository trait

use async_trait::async_trait;
use quizzler_common::UserId;
use quizzler_errors::AppResult;

use crate::domain::{Folder, FolderId, Module, ModuleId};

#[async_trait]
pub trait FolderRepository: Send + Sync {
    async fn find_by_id(&self, id: &FolderId) -> AppResult<Option<Folder>>;

    async fn list_by_user(&self, user_id: &UserId) -> AppResult<Vec<Folder>>;

    async fn save(&self, folder: &Folder) -> AppResult<()>;

    async fn update(&self, folder: &Folder) -> AppResult<()>;

    /// 删除文件夹，返回被删除的实体
    async fn delete(&self, id: &FolderId) -> AppResult<Option<Folder>>;
}

#[async_trait]
pub trait ModuleRepository: Send + Sync {
    async fn find_by_id(&self, id: &ModuleId) -> AppResult<Option<Module>>;

    async fn list_by_user(&self, user_id: &UserId) -> AppResult<Vec<Module>>;

    /// 标记为难点的模块
    async fn list_difficult(&self, user_id: &UserId) -> AppResult<Vec<Module>>;

    async fn save(&self, module: &Module) -> AppResult<()>;

    async fn update(&self, module: &Module) -> AppResult<()>;

    /// 删除模块，返回被删除的实体
    async fn delete(&self, id: &ModuleId) -> AppResult<Option<Module>>;
}
