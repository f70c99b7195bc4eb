//! 测验事件
//!
//! 实体事件的负载是完整实体（含关系 id），列表事件的负载带上所属用户，
//! 缓存 worker 只凭负载就能算出桶与字段。

use quizzler_common::UserId;
use quizzler_event_core::{DecodeError, FactEvent, RoutedEvent, decode_json, encode_json};
use serde::{Deserialize, Serialize};

use crate::domain::{Folder, Module};

pub const FOLDER_CREATED: &str = "card-quizzler-service.folder.created";
pub const FOLDER_FETCHED: &str = "card-quizzler-service.folder.fetched";
pub const FOLDER_MUTATED: &str = "card-quizzler-service.folder.mutated";
pub const FOLDER_DELETED: &str = "card-quizzler-service.folder.deleted";
pub const MODULE_CREATED: &str = "card-quizzler-service.module.created";
pub const MODULE_FETCHED: &str = "card-quizzler-service.module.fetched";
pub const MODULE_MUTATED: &str = "card-quizzler-service.module.mutated";
pub const MODULE_DELETED: &str = "card-quizzler-service.module.deleted";
pub const FOLDERS_FETCHED: &str = "card-quizzler-service.folders.fetched";
pub const MODULES_FETCHED: &str = "card-quizzler-service.modules.fetched";
pub const DIFFICULT_MODULES_FETCHED: &str = "card-quizzler-service.difficult-modules.fetched";

/// 用户服务的删除事件；只依赖路由键字符串，不共享类型
pub const USER_DELETED: &str = "user-service.user.deleted";

/// 某个用户的文件夹列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderList {
    pub user_id: UserId,
    pub folders: Vec<Folder>,
}

/// 某个用户的模块列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleList {
    pub user_id: UserId,
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuizEvent {
    FolderCreated(Folder),
    FolderFetched(Folder),
    FolderMutated(Folder),
    FolderDeleted(Folder),
    ModuleCreated(Module),
    ModuleFetched(Module),
    ModuleMutated(Module),
    ModuleDeleted(Module),
    FoldersFetched(FolderList),
    ModulesFetched(ModuleList),
    DifficultModulesFetched(ModuleList),
}

impl FactEvent for QuizEvent {
    fn routing_key(&self) -> &'static str {
        match self {
            Self::FolderCreated(_) => FOLDER_CREATED,
            Self::FolderFetched(_) => FOLDER_FETCHED,
            Self::FolderMutated(_) => FOLDER_MUTATED,
            Self::FolderDeleted(_) => FOLDER_DELETED,
            Self::ModuleCreated(_) => MODULE_CREATED,
            Self::ModuleFetched(_) => MODULE_FETCHED,
            Self::ModuleMutated(_) => MODULE_MUTATED,
            Self::ModuleDeleted(_) => MODULE_DELETED,
            Self::FoldersFetched(_) => FOLDERS_FETCHED,
            Self::ModulesFetched(_) => MODULES_FETCHED,
            Self::DifficultModulesFetched(_) => DIFFICULT_MODULES_FETCHED,
        }
    }

    fn payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::FolderCreated(folder)
            | Self::FolderFetched(folder)
            | Self::FolderMutated(folder)
            | Self::FolderDeleted(folder) => encode_json(folder),
            Self::ModuleCreated(module)
            | Self::ModuleFetched(module)
            | Self::ModuleMutated(module)
            | Self::ModuleDeleted(module) => encode_json(module),
            Self::FoldersFetched(list) => encode_json(list),
            Self::ModulesFetched(list) | Self::DifficultModulesFetched(list) => encode_json(list),
        }
    }
}

impl RoutedEvent for QuizEvent {
    fn routing_keys() -> &'static [&'static str] {
        &[
            FOLDER_CREATED,
            FOLDER_FETCHED,
            FOLDER_MUTATED,
            FOLDER_DELETED,
            MODULE_CREATED,
            MODULE_FETCHED,
            MODULE_MUTATED,
            MODULE_DELETED,
            FOLDERS_FETCHED,
            MODULES_FETCHED,
            DIFFICULT_MODULES_FETCHED,
        ]
    }

    fn decode(routing_key: &str, payload: &[u8]) -> Result<Option<Self>, DecodeError> {
        Ok(match routing_key {
            FOLDER_CREATED => Some(Self::FolderCreated(decode_json(routing_key, payload)?)),
            FOLDER_FETCHED => Some(Self::FolderFetched(decode_json(routing_key, payload)?)),
            FOLDER_MUTATED => Some(Self::FolderMutated(decode_json(routing_key, payload)?)),
            FOLDER_DELETED => Some(Self::FolderDeleted(decode_json(routing_key, payload)?)),
            MODULE_CREATED => Some(Self::ModuleCreated(decode_json(routing_key, payload)?)),
            MODULE_FETCHED => Some(Self::ModuleFetched(decode_json(routing_key, payload)?)),
            MODULE_MUTATED => Some(Self::ModuleMutated(decode_json(routing_key, payload)?)),
            MODULE_DELETED => Some(Self::ModuleDeleted(decode_json(routing_key, payload)?)),
            FOLDERS_FETCHED => Some(Self::FoldersFetched(decode_json(routing_key, payload)?)),
            MODULES_FETCHED => Some(Self::ModulesFetched(decode_json(routing_key, payload)?)),
            DIFFICULT_MODULES_FETCHED => {
                Some(Self::DifficultModulesFetched(decode_json(routing_key, payload)?))
            }
            _ => None,
        })
    }
}

/// 用户删除事件中本服务关心的部分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserLifecycleEvent {
    Deleted(UserRef),
}

impl RoutedEvent for UserLifecycleEvent {
    fn routing_keys() -> &'static [&'static str] {
        &[USER_DELETED]
    }

    fn decode(routing_key: &str, payload: &[u8]) -> Result<Option<Self>, DecodeError> {
        Ok(match routing_key {
            USER_DELETED => Some(Self::Deleted(decode_json(routing_key, payload)?)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_decodes_under_its_own_key() {
        let user_id = UserId::new();
        let folder = Folder::new(user_id, "Spanish").unwrap();
        let module = Module::new(user_id, "Verbs").unwrap();

        let events = vec![
            QuizEvent::FolderCreated(folder.clone()),
            QuizEvent::FolderMutated(folder.clone()),
            QuizEvent::ModuleDeleted(module.clone()),
            QuizEvent::FoldersFetched(FolderList {
                user_id,
                folders: vec![folder],
            }),
            QuizEvent::DifficultModulesFetched(ModuleList {
                user_id,
                modules: vec![module],
            }),
        ];

        for event in events {
            let decoded = QuizEvent::decode(event.routing_key(), &event.payload().unwrap())
                .unwrap()
                .unwrap();
            assert_eq!(decoded, event);
        }
    }

    #[test]
    fn test_routing_keys_are_unique() {
        let mut keys = QuizEvent::routing_keys().to_vec();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), QuizEvent::routing_keys().len());
    }

    #[test]
    fn test_user_deleted_ignores_foreign_fields() {
        let id = UserId::new();
        let payload = format!(r#"{{"id":"{}","email":"ada@example.com"}}"#, id);

        let decoded = UserLifecycleEvent::decode(USER_DELETED, payload.as_bytes())
            .unwrap()
            .unwrap();
        assert_eq!(decoded, UserLifecycleEvent::Deleted(UserRef { id }));
    }
}
