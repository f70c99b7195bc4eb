//! 内存测验仓储
//!
//! 本地运行与集成测试使用；记录读次数，便于断言缓存命中时没有读主存储。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use quizzler_common::UserId;
use quizzler_errors::{AppError, AppResult};

use crate::domain::{Folder, FolderId, FolderRepository, Module, ModuleId, ModuleRepository};

#[derive(Default)]
pub struct InMemoryFolderRepository {
    folders: RwLock<HashMap<FolderId, Folder>>,
    reads: AtomicUsize,
}

impl InMemoryFolderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累计读次数
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FolderRepository for InMemoryFolderRepository {
    async fn find_by_id(&self, id: &FolderId) -> AppResult<Option<Folder>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.folders.read().get(id).cloned())
    }

    async fn list_by_user(&self, user_id: &UserId) -> AppResult<Vec<Folder>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut folders: Vec<Folder> = self
            .folders
            .read()
            .values()
            .filter(|f| f.user_id == *user_id)
            .cloned()
            .collect();
        folders.sort_by_key(|f| f.id.0);
        Ok(folders)
    }

    async fn save(&self, folder: &Folder) -> AppResult<()> {
        self.folders.write().insert(folder.id, folder.clone());
        Ok(())
    }

    async fn update(&self, folder: &Folder) -> AppResult<()> {
        match self.folders.write().get_mut(&folder.id) {
            Some(stored) => {
                *stored = folder.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!("Folder not found: {}", folder.id))),
        }
    }

    async fn delete(&self, id: &FolderId) -> AppResult<Option<Folder>> {
        Ok(self.folders.write().remove(id))
    }
}

#[derive(Default)]
pub struct InMemoryModuleRepository {
    modules: RwLock<HashMap<ModuleId, Module>>,
    reads: AtomicUsize,
}

impl InMemoryModuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累计读次数
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn collect(&self, filter: impl Fn(&Module) -> bool) -> Vec<Module> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut modules: Vec<Module> = self
            .modules
            .read()
            .values()
            .filter(|m| filter(m))
            .cloned()
            .collect();
        modules.sort_by_key(|m| m.id.0);
        modules
    }
}

#[async_trait]
impl ModuleRepository for InMemoryModuleRepository {
    async fn find_by_id(&self, id: &ModuleId) -> AppResult<Option<Module>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.modules.read().get(id).cloned())
    }

    async fn list_by_user(&self, user_id: &UserId) -> AppResult<Vec<Module>> {
        Ok(self.collect(|m| m.user_id == *user_id))
    }

    async fn list_difficult(&self, user_id: &UserId) -> AppResult<Vec<Module>> {
        Ok(self.collect(|m| m.user_id == *user_id && m.difficult))
    }

    async fn save(&self, module: &Module) -> AppResult<()> {
        self.modules.write().insert(module.id, module.clone());
        Ok(())
    }

    async fn update(&self, module: &Module) -> AppResult<()> {
        match self.modules.write().get_mut(&module.id) {
            Some(stored) => {
                *stored = module.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!("Module not found: {}", module.id))),
        }
    }

    async fn delete(&self, id: &ModuleId) -> AppResult<Option<Module>> {
        Ok(self.modules.write().remove(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_difficult_modules_are_scoped_to_user() {
        let repo = InMemoryModuleRepository::new();
        let owner = UserId::new();

        let mut hard = Module::new(owner, "Subjunctive").unwrap();
        hard.difficult = true;
        let easy = Module::new(owner, "Greetings").unwrap();
        let mut foreign = Module::new(UserId::new(), "Kanji").unwrap();
        foreign.difficult = true;
        for module in [&hard, &easy, &foreign] {
            repo.save(module).await.unwrap();
        }

        assert_eq!(repo.list_difficult(&owner).await.unwrap(), vec![hard]);
        assert_eq!(repo.list_by_user(&owner).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_of_missing_folder_is_not_found() {
        let repo = InMemoryFolderRepository::new();
        let folder = Folder::new(UserId::new(), "Spanish").unwrap();

        assert!(matches!(
            repo.update(&folder).await,
            Err(AppError::NotFound(_))
        ));
    }
}
