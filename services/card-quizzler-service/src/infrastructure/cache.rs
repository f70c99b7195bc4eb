//! 测验缓存
//!
//! 每个用户一个桶 `hash:card-quiz-cache-<uid>`，字段：
//! `folders`、`modules`、`difficult-modules` 三个列表，以及 `folder:<id>`、`module:<id>` 单体。
//!
//! 文件夹与模块是多对多关系：任一侧变更时，另一侧所有关联实体的单体缓存
//! 和全部列表缓存一并失效，关系 id 取自事件负载本身。

use std::sync::Arc;
use std::time::Duration;

use quizzler_cache_core::{CacheManager, CachePlan, CacheRules, KeyedCacheStore};
use quizzler_common::UserId;
use quizzler_errors::AppResult;
use quizzler_ports::{EventBus, Subscription};

use crate::application::{QuizEvent, UserLifecycleEvent};
use crate::domain::{Folder, FolderId, Module, ModuleId};

pub const FOLDERS_FIELD: &str = "folders";
pub const MODULES_FIELD: &str = "modules";
pub const DIFFICULT_MODULES_FIELD: &str = "difficult-modules";

pub fn quiz_bucket(user_id: &UserId) -> String {
    format!("hash:card-quiz-cache-{}", user_id)
}

pub fn folder_field(id: &FolderId) -> String {
    format!("folder:{}", id)
}

pub fn module_field(id: &ModuleId) -> String {
    format!("module:{}", id)
}

/// 测验实体与列表的缓存规则
#[derive(Debug, Clone, Copy, Default)]
pub struct QuizCacheRules;

impl QuizCacheRules {
    /// 文件夹变更：自身、文件夹列表、所含模块的单体与模块列表
    fn folder_fanout(plan: CachePlan, folder: &Folder) -> CachePlan {
        let bucket = quiz_bucket(&folder.user_id);
        let plan = folder
            .module_ids
            .iter()
            .fold(plan, |plan, id| plan.delete_field(bucket.clone(), module_field(id)));
        plan.delete_field(bucket.clone(), FOLDERS_FIELD)
            .delete_field(bucket.clone(), MODULES_FIELD)
            .delete_field(bucket, DIFFICULT_MODULES_FIELD)
    }

    /// 模块变更：自身、模块列表、所属文件夹的单体与文件夹列表
    fn module_fanout(plan: CachePlan, module: &Module) -> CachePlan {
        let bucket = quiz_bucket(&module.user_id);
        let plan = module
            .folder_ids
            .iter()
            .fold(plan, |plan, id| plan.delete_field(bucket.clone(), folder_field(id)));
        plan.delete_field(bucket.clone(), MODULES_FIELD)
            .delete_field(bucket.clone(), DIFFICULT_MODULES_FIELD)
            .delete_field(bucket, FOLDERS_FIELD)
    }
}

impl CacheRules for QuizCacheRules {
    type Event = QuizEvent;

    fn name(&self) -> &'static str {
        "quiz"
    }

    fn plan(&self, event: &QuizEvent) -> AppResult<CachePlan> {
        match event {
            QuizEvent::FolderCreated(folder) => {
                let plan = CachePlan::populate().set_field_json(
                    quiz_bucket(&folder.user_id),
                    folder_field(&folder.id),
                    folder,
                )?;
                Ok(Self::folder_fanout(plan, folder))
            }
            QuizEvent::FolderFetched(folder) => CachePlan::populate().set_field_json(
                quiz_bucket(&folder.user_id),
                folder_field(&folder.id),
                folder,
            ),
            QuizEvent::FolderMutated(folder) | QuizEvent::FolderDeleted(folder) => {
                let plan = CachePlan::invalidate_fanout()
                    .delete_field(quiz_bucket(&folder.user_id), folder_field(&folder.id));
                Ok(Self::folder_fanout(plan, folder))
            }
            QuizEvent::ModuleCreated(module) => {
                let plan = CachePlan::populate().set_field_json(
                    quiz_bucket(&module.user_id),
                    module_field(&module.id),
                    module,
                )?;
                Ok(Self::module_fanout(plan, module))
            }
            QuizEvent::ModuleFetched(module) => CachePlan::populate().set_field_json(
                quiz_bucket(&module.user_id),
                module_field(&module.id),
                module,
            ),
            QuizEvent::ModuleMutated(module) | QuizEvent::ModuleDeleted(module) => {
                let plan = CachePlan::invalidate_fanout()
                    .delete_field(quiz_bucket(&module.user_id), module_field(&module.id));
                Ok(Self::module_fanout(plan, module))
            }
            QuizEvent::FoldersFetched(list) => CachePlan::populate().set_field_json(
                quiz_bucket(&list.user_id),
                FOLDERS_FIELD,
                &list.folders,
            ),
            QuizEvent::ModulesFetched(list) => CachePlan::populate().set_field_json(
                quiz_bucket(&list.user_id),
                MODULES_FIELD,
                &list.modules,
            ),
            QuizEvent::DifficultModulesFetched(list) => CachePlan::populate().set_field_json(
                quiz_bucket(&list.user_id),
                DIFFICULT_MODULES_FIELD,
                &list.modules,
            ),
        }
    }
}

/// 用户被删除时丢弃整个测验桶
#[derive(Debug, Clone, Copy, Default)]
pub struct UserLifecycleRules;

impl CacheRules for UserLifecycleRules {
    type Event = UserLifecycleEvent;

    fn name(&self) -> &'static str {
        "quiz-user-lifecycle"
    }

    fn plan(&self, event: &UserLifecycleEvent) -> AppResult<CachePlan> {
        match event {
            UserLifecycleEvent::Deleted(user) => {
                Ok(CachePlan::invalidate_single().delete(quiz_bucket(&user.id)))
            }
        }
    }
}

/// 读路径缓存视图
#[derive(Clone)]
pub struct QuizCache {
    store: KeyedCacheStore,
}

impl QuizCache {
    pub fn new(store: KeyedCacheStore) -> Self {
        Self { store }
    }

    pub async fn folder(&self, user_id: &UserId, id: &FolderId) -> Option<Folder> {
        self.store
            .get_field_json(&quiz_bucket(user_id), &folder_field(id))
            .await
    }

    pub async fn module(&self, user_id: &UserId, id: &ModuleId) -> Option<Module> {
        self.store
            .get_field_json(&quiz_bucket(user_id), &module_field(id))
            .await
    }

    pub async fn folders(&self, user_id: &UserId) -> Option<Vec<Folder>> {
        self.store
            .get_field_json(&quiz_bucket(user_id), FOLDERS_FIELD)
            .await
    }

    pub async fn modules(&self, user_id: &UserId) -> Option<Vec<Module>> {
        self.store
            .get_field_json(&quiz_bucket(user_id), MODULES_FIELD)
            .await
    }

    pub async fn difficult_modules(&self, user_id: &UserId) -> Option<Vec<Module>> {
        self.store
            .get_field_json(&quiz_bucket(user_id), DIFFICULT_MODULES_FIELD)
            .await
    }
}

/// 创建测验缓存管理器，注册本服务规则与用户删除规则
pub async fn register_quiz_cache(
    bus: &dyn EventBus,
    store: KeyedCacheStore,
    ttl: Duration,
) -> AppResult<Vec<Subscription>> {
    let manager = Arc::new(CacheManager::new("quiz-cache", store, ttl));
    let quiz = manager.register(bus, QuizCacheRules).await?;
    let lifecycle = manager.register(bus, UserLifecycleRules).await?;
    Ok(vec![quiz, lifecycle])
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizzler_cache_core::{CacheMutation, CachePolicy};

    use crate::application::{FolderList, UserRef};

    fn addr(user_id: &UserId, field: impl AsRef<str>) -> String {
        format!("{}#{}", quiz_bucket(user_id), field.as_ref())
    }

    #[test]
    fn test_module_mutation_fans_out_to_owning_folders() {
        let user_id = UserId::new();
        let mut module = Module::new(user_id, "Verbs").unwrap();
        let f1 = FolderId::new();
        let f2 = FolderId::new();
        module.link(f1);
        module.link(f2);

        let plan = QuizCacheRules
            .plan(&QuizEvent::ModuleMutated(module.clone()))
            .unwrap();
        assert_eq!(plan.policy, CachePolicy::InvalidateFanout);

        let invalidated = plan.invalidated();
        for expected in [
            addr(&user_id, module_field(&module.id)),
            addr(&user_id, folder_field(&f1)),
            addr(&user_id, folder_field(&f2)),
            addr(&user_id, FOLDERS_FIELD),
            addr(&user_id, MODULES_FIELD),
            addr(&user_id, DIFFICULT_MODULES_FIELD),
        ] {
            assert!(invalidated.contains(&expected), "missing {}", expected);
        }
        assert_eq!(invalidated.len(), 6);
    }

    #[test]
    fn test_folder_deletion_fans_out_to_contained_modules() {
        let user_id = UserId::new();
        let mut folder = Folder::new(user_id, "Spanish").unwrap();
        let m = ModuleId::new();
        folder.attach(m);

        let invalidated = QuizCacheRules
            .plan(&QuizEvent::FolderDeleted(folder.clone()))
            .unwrap()
            .invalidated();

        assert!(invalidated.contains(&addr(&user_id, folder_field(&folder.id))));
        assert!(invalidated.contains(&addr(&user_id, module_field(&m))));
        assert!(invalidated.contains(&addr(&user_id, FOLDERS_FIELD)));
    }

    #[test]
    fn test_created_populates_and_drops_stale_lists() {
        let user_id = UserId::new();
        let folder = Folder::new(user_id, "Spanish").unwrap();

        let plan = QuizCacheRules
            .plan(&QuizEvent::FolderCreated(folder.clone()))
            .unwrap();
        assert_eq!(plan.policy, CachePolicy::Populate);
        assert!(matches!(
            &plan.mutations[0],
            CacheMutation::SetField { field, .. } if *field == folder_field(&folder.id)
        ));
        assert!(plan.invalidated().contains(&addr(&user_id, FOLDERS_FIELD)));
    }

    #[test]
    fn test_list_fetch_populates_list_field() {
        let user_id = UserId::new();
        let plan = QuizCacheRules
            .plan(&QuizEvent::FoldersFetched(FolderList {
                user_id,
                folders: Vec::new(),
            }))
            .unwrap();

        assert_eq!(
            plan.mutations,
            vec![CacheMutation::SetField {
                bucket: quiz_bucket(&user_id),
                field: FOLDERS_FIELD.to_string(),
                value: "[]".to_string(),
            }]
        );
    }

    #[test]
    fn test_user_deletion_drops_the_bucket() {
        let id = UserId::new();
        let plan = UserLifecycleRules
            .plan(&UserLifecycleEvent::Deleted(UserRef { id }))
            .unwrap();
        assert_eq!(plan.invalidated(), vec![quiz_bucket(&id)]);
    }
}
