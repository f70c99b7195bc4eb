//! 路由键
//!
//! 路由键是发布者与订阅者之间唯一的契约，格式为
//! `<service>.<entity>.<action>`，例如 `card-quizzler-service.folder.mutated`。

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingKeyError {
    #[error("routing key `{0}` must have at least three non-empty segments")]
    Malformed(String),
}

/// 事件动作
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Created,
    Fetched,
    Updated,
    Deleted,
    Mutated,
    Other(String),
}

impl Action {
    pub fn parse(s: &str) -> Self {
        match s {
            "created" => Self::Created,
            "fetched" => Self::Fetched,
            "updated" => Self::Updated,
            "deleted" => Self::Deleted,
            "mutated" => Self::Mutated,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Fetched => "fetched",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Mutated => "mutated",
            Self::Other(s) => s,
        }
    }
}

/// 解析后的路由键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingKey {
    service: String,
    entity: String,
    action: Action,
}

impl RoutingKey {
    pub fn new(service: impl Into<String>, entity: impl Into<String>, action: Action) -> Self {
        Self {
            service: service.into(),
            entity: entity.into(),
            action,
        }
    }

    /// 解析 `service.entity[.sub].action`
    ///
    /// 首段为服务名，末段为动作，中间所有段组成实体名。
    pub fn parse(key: &str) -> Result<Self, RoutingKeyError> {
        let segments: Vec<&str> = key.split('.').collect();
        if segments.len() < 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(RoutingKeyError::Malformed(key.to_string()));
        }

        let last = segments.len() - 1;
        Ok(Self {
            service: segments[0].to_string(),
            entity: segments[1..last].join("."),
            action: Action::parse(segments[last]),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn action(&self) -> &Action {
        &self.action
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.service, self.entity, self.action.as_str())
    }
}

/// 主题绑定匹配
///
/// `*` 恰好匹配一段，`#` 匹配零或多段，其余按字面比较。
pub fn topic_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    segments_match(&pattern, &key)
}

fn segments_match(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => {
            segments_match(rest, key) || (!key.is_empty() && segments_match(pattern, &key[1..]))
        }
        Some((&"*", rest)) => !key.is_empty() && segments_match(rest, &key[1..]),
        Some((literal, rest)) => match key.split_first() {
            Some((segment, key_rest)) if segment == literal => segments_match(rest, key_rest),
            _ => false,
        },
    }
}

/// 模式是否包含通配符
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.split('.').any(|s| s == "*" || s == "#")
}
