//! Module 实体

use quizzler_common::UserId;
use quizzler_errors::AppResult;
use serde::{Deserialize, Serialize};

use crate::domain::folder::validate_title;
use crate::domain::{FolderId, ModuleId};

/// 卡片模块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub user_id: UserId,
    pub title: String,
    /// 包含该模块的所有文件夹
    #[serde(default)]
    pub folder_ids: Vec<FolderId>,
    /// 是否标记为难点模块
    #[serde(default)]
    pub difficult: bool,
}

impl Module {
    pub fn new(user_id: UserId, title: impl Into<String>) -> AppResult<Self> {
        let title = title.into();
        validate_title(&title)?;
        Ok(Self {
            id: ModuleId::new(),
            user_id,
            title,
            folder_ids: Vec::new(),
            difficult: false,
        })
    }

    pub fn apply(&mut self, changes: ModuleChanges) -> AppResult<()> {
        if let Some(title) = changes.title {
            validate_title(&title)?;
            self.title = title;
        }
        if let Some(difficult) = changes.difficult {
            self.difficult = difficult;
        }
        Ok(())
    }

    pub fn link(&mut self, folder_id: FolderId) {
        if !self.folder_ids.contains(&folder_id) {
            self.folder_ids.push(folder_id);
        }
    }

    pub fn unlink(&mut self, folder_id: &FolderId) {
        self.folder_ids.retain(|id| id != folder_id);
    }
}

/// 模块修改
#[derive(Debug, Clone, Default)]
pub struct ModuleChanges {
    pub title: Option<String>,
    pub difficult: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_changes() {
        let mut module = Module::new(UserId::new(), "Verbs").unwrap();
        module
            .apply(ModuleChanges {
                title: None,
                difficult: Some(true),
            })
            .unwrap();

        assert_eq!(module.title, "Verbs");
        assert!(module.difficult);
    }

    #[test]
    fn test_missing_relations_default_to_empty() {
        let json = format!(
            r#"{{"id":"{}","user_id":"{}","title":"Verbs"}}"#,
            ModuleId::new(),
            UserId::new()
        );
        let module: Module = serde_json::from_str(&json).unwrap();
        assert!(module.folder_ids.is_empty());
        assert!(!module.difficult);
    }
}
