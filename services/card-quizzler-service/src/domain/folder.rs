//! Folder 实体

use quizzler_common::UserId;
use quizzler_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::domain::{FolderId, ModuleId};

/// 文件夹
///
/// `module_ids` 是多对多关系在文件夹一侧的副本，事件负载依赖它计算失效范围。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub user_id: UserId,
    pub title: String,
    #[serde(default)]
    pub module_ids: Vec<ModuleId>,
}

impl Folder {
    pub fn new(user_id: UserId, title: impl Into<String>) -> AppResult<Self> {
        let title = title.into();
        validate_title(&title)?;
        Ok(Self {
            id: FolderId::new(),
            user_id,
            title,
            module_ids: Vec::new(),
        })
    }

    pub fn rename(&mut self, title: impl Into<String>) -> AppResult<()> {
        let title = title.into();
        validate_title(&title)?;
        self.title = title;
        Ok(())
    }

    pub fn contains(&self, module_id: &ModuleId) -> bool {
        self.module_ids.contains(module_id)
    }

    /// 已包含时返回 `false`
    pub fn attach(&mut self, module_id: ModuleId) -> bool {
        if self.contains(&module_id) {
            return false;
        }
        self.module_ids.push(module_id);
        true
    }

    /// 不包含时返回 `false`
    pub fn detach(&mut self, module_id: &ModuleId) -> bool {
        let before = self.module_ids.len();
        self.module_ids.retain(|id| id != module_id);
        self.module_ids.len() != before
    }
}

pub(crate) fn validate_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::validation("Title must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_and_detach_are_idempotent() {
        let mut folder = Folder::new(UserId::new(), "Spanish").unwrap();
        let module = ModuleId::new();

        assert!(folder.attach(module));
        assert!(!folder.attach(module));
        assert_eq!(folder.module_ids, vec![module]);

        assert!(folder.detach(&module));
        assert!(!folder.detach(&module));
        assert!(folder.module_ids.is_empty());
    }

    #[test]
    fn test_blank_title_is_rejected() {
        assert!(matches!(
            Folder::new(UserId::new(), " "),
            Err(AppError::Validation(_))
        ));
    }
}
