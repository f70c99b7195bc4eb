//! User 实体

use chrono::{DateTime, Utc};
use quizzler_common::UserId;
use quizzler_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// 用户
///
/// 序列化形式同时是事件负载和缓存值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, username: impl Into<String>) -> AppResult<Self> {
        let email = email.into();
        let username = username.into();
        validate_email(&email)?;
        validate_username(&username)?;

        Ok(Self {
            id: UserId::new(),
            email,
            username,
            created_at: Utc::now(),
        })
    }

    /// 应用修改；返回被替换掉的旧邮箱（如果邮箱变了）
    pub fn apply(&mut self, changes: UserChanges) -> AppResult<Option<String>> {
        if let Some(username) = changes.username {
            validate_username(&username)?;
            self.username = username;
        }

        match changes.email {
            Some(email) if email != self.email => {
                validate_email(&email)?;
                Ok(Some(std::mem::replace(&mut self.email, email)))
            }
            _ => Ok(None),
        }
    }
}

/// 用户修改
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub username: Option<String>,
}

fn validate_email(email: &str) -> AppResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::validation(format!("Invalid email: {}", email))),
    }
}

fn validate_username(username: &str) -> AppResult<()> {
    if username.trim().is_empty() {
        return Err(AppError::validation("Username must not be empty"));
    }
    Ok(())
}
