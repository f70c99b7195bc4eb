//! 测验读写处理器
//!
//! 写：先提交主存储，再发布事实事件，发布失败不回滚。
//! 读：先查用户的测验桶，未命中回落主存储并发布对应的 `*.fetched`。
//! 所有操作都带调用方的用户 id，不属于该用户的实体按不存在处理。

use std::sync::Arc;

use quizzler_common::UserId;
use quizzler_errors::{AppError, AppResult};
use quizzler_event_core::FactPublisher;
use tracing::{debug, info};

use crate::application::{FolderList, ModuleList, QuizEvent};
use crate::domain::{
    Folder, FolderId, FolderRepository, Module, ModuleChanges, ModuleId, ModuleRepository,
};
use crate::infrastructure::QuizCache;

pub struct QuizService {
    folders: Arc<dyn FolderRepository>,
    modules: Arc<dyn ModuleRepository>,
    cache: QuizCache,
    publisher: FactPublisher,
}

impl QuizService {
    pub fn new(
        folders: Arc<dyn FolderRepository>,
        modules: Arc<dyn ModuleRepository>,
        cache: QuizCache,
        publisher: FactPublisher,
    ) -> Self {
        Self {
            folders,
            modules,
            cache,
            publisher,
        }
    }

    // ---- 写 ----

    pub async fn create_folder(&self, user_id: &UserId, title: &str) -> AppResult<Folder> {
        let folder = Folder::new(*user_id, title)?;
        self.folders.save(&folder).await?;
        info!(folder_id = %folder.id, user_id = %user_id, "Folder created");

        self.publish(QuizEvent::FolderCreated(folder.clone())).await;
        Ok(folder)
    }

    pub async fn rename_folder(
        &self,
        user_id: &UserId,
        id: &FolderId,
        title: &str,
    ) -> AppResult<Folder> {
        let mut folder = self.owned_folder(user_id, id).await?;
        folder.rename(title)?;
        self.folders.update(&folder).await?;

        self.publish(QuizEvent::FolderMutated(folder.clone())).await;
        Ok(folder)
    }

    /// 删除文件夹，并把它从所含模块的关系中移除
    pub async fn delete_folder(&self, user_id: &UserId, id: &FolderId) -> AppResult<()> {
        let folder = self.owned_folder(user_id, id).await?;

        for module_id in &folder.module_ids {
            if let Some(mut module) = self.modules.find_by_id(module_id).await? {
                module.unlink(id);
                self.modules.update(&module).await?;
            }
        }
        self.folders.delete(id).await?;
        info!(folder_id = %id, modules = folder.module_ids.len(), "Folder deleted");

        self.publish(QuizEvent::FolderDeleted(folder)).await;
        Ok(())
    }

    pub async fn create_module(&self, user_id: &UserId, title: &str) -> AppResult<Module> {
        let module = Module::new(*user_id, title)?;
        self.modules.save(&module).await?;
        info!(module_id = %module.id, user_id = %user_id, "Module created");

        self.publish(QuizEvent::ModuleCreated(module.clone())).await;
        Ok(module)
    }

    pub async fn update_module(
        &self,
        user_id: &UserId,
        id: &ModuleId,
        changes: ModuleChanges,
    ) -> AppResult<Module> {
        let mut module = self.owned_module(user_id, id).await?;
        module.apply(changes)?;
        self.modules.update(&module).await?;

        self.publish(QuizEvent::ModuleMutated(module.clone())).await;
        Ok(module)
    }

    /// 删除模块，并把它从所属文件夹中移除
    pub async fn delete_module(&self, user_id: &UserId, id: &ModuleId) -> AppResult<()> {
        let module = self.owned_module(user_id, id).await?;

        for folder_id in &module.folder_ids {
            if let Some(mut folder) = self.folders.find_by_id(folder_id).await? {
                folder.detach(id);
                self.folders.update(&folder).await?;
            }
        }
        self.modules.delete(id).await?;
        info!(module_id = %id, folders = module.folder_ids.len(), "Module deleted");

        self.publish(QuizEvent::ModuleDeleted(module)).await;
        Ok(())
    }

    /// 把模块加入文件夹
    ///
    /// 发布的 `module.mutated` 负载已包含新文件夹，失效范围覆盖该文件夹。
    pub async fn add_module_to_folder(
        &self,
        user_id: &UserId,
        folder_id: &FolderId,
        module_id: &ModuleId,
    ) -> AppResult<Module> {
        let mut folder = self.owned_folder(user_id, folder_id).await?;
        let mut module = self.owned_module(user_id, module_id).await?;

        if !folder.attach(*module_id) {
            debug!(folder_id = %folder_id, module_id = %module_id, "Module already in folder");
            return Ok(module);
        }
        module.link(*folder_id);
        self.folders.update(&folder).await?;
        self.modules.update(&module).await?;

        self.publish(QuizEvent::ModuleMutated(module.clone())).await;
        Ok(module)
    }

    /// 把模块移出文件夹
    ///
    /// 移除后的模块负载不再指向该文件夹，所以文件夹一侧单独发布 `folder.mutated`。
    pub async fn remove_module_from_folder(
        &self,
        user_id: &UserId,
        folder_id: &FolderId,
        module_id: &ModuleId,
    ) -> AppResult<Module> {
        let mut folder = self.owned_folder(user_id, folder_id).await?;
        let mut module = self.owned_module(user_id, module_id).await?;

        if !folder.detach(module_id) {
            return Ok(module);
        }
        module.unlink(folder_id);
        self.folders.update(&folder).await?;
        self.modules.update(&module).await?;

        self.publish(QuizEvent::FolderMutated(folder)).await;
        self.publish(QuizEvent::ModuleMutated(module.clone())).await;
        Ok(module)
    }

    // ---- 读 ----

    pub async fn get_folder(&self, user_id: &UserId, id: &FolderId) -> AppResult<Folder> {
        if let Some(folder) = self.cache.folder(user_id, id).await {
            return Ok(folder);
        }
        let folder = self.owned_folder(user_id, id).await?;
        self.publish(QuizEvent::FolderFetched(folder.clone())).await;
        Ok(folder)
    }

    pub async fn get_module(&self, user_id: &UserId, id: &ModuleId) -> AppResult<Module> {
        if let Some(module) = self.cache.module(user_id, id).await {
            return Ok(module);
        }
        let module = self.owned_module(user_id, id).await?;
        self.publish(QuizEvent::ModuleFetched(module.clone())).await;
        Ok(module)
    }

    pub async fn list_folders(&self, user_id: &UserId) -> AppResult<Vec<Folder>> {
        if let Some(folders) = self.cache.folders(user_id).await {
            return Ok(folders);
        }
        let folders = self.folders.list_by_user(user_id).await?;
        self.publish(QuizEvent::FoldersFetched(FolderList {
            user_id: *user_id,
            folders: folders.clone(),
        }))
        .await;
        Ok(folders)
    }

    pub async fn list_modules(&self, user_id: &UserId) -> AppResult<Vec<Module>> {
        if let Some(modules) = self.cache.modules(user_id).await {
            return Ok(modules);
        }
        let modules = self.modules.list_by_user(user_id).await?;
        self.publish(QuizEvent::ModulesFetched(ModuleList {
            user_id: *user_id,
            modules: modules.clone(),
        }))
        .await;
        Ok(modules)
    }

    pub async fn list_difficult_modules(&self, user_id: &UserId) -> AppResult<Vec<Module>> {
        if let Some(modules) = self.cache.difficult_modules(user_id).await {
            return Ok(modules);
        }
        let modules = self.modules.list_difficult(user_id).await?;
        self.publish(QuizEvent::DifficultModulesFetched(ModuleList {
            user_id: *user_id,
            modules: modules.clone(),
        }))
        .await;
        Ok(modules)
    }

    async fn owned_folder(&self, user_id: &UserId, id: &FolderId) -> AppResult<Folder> {
        self.folders
            .find_by_id(id)
            .await?
            .filter(|f| f.user_id == *user_id)
            .ok_or_else(|| AppError::not_found(format!("Folder not found: {}", id)))
    }

    async fn owned_module(&self, user_id: &UserId, id: &ModuleId) -> AppResult<Module> {
        self.modules
            .find_by_id(id)
            .await?
            .filter(|m| m.user_id == *user_id)
            .ok_or_else(|| AppError::not_found(format!("Module not found: {}", id)))
    }

    async fn publish(&self, event: QuizEvent) {
        self.publisher.publish_or_log(&event).await;
    }
}
