//! 用户事件
//!
//! 路由键字符串是服务之间唯一的契约，其他服务自行解码需要的负载。

use quizzler_common::UserId;
use quizzler_event_core::{DecodeError, FactEvent, RoutedEvent, decode_json, encode_json};
use serde::{Deserialize, Serialize};

use crate::domain::User;

pub const USER_CREATED: &str = "user-service.user.created";
pub const USER_FETCHED: &str = "user-service.user.fetched";
pub const USER_UPDATED: &str = "user-service.user.updated";
pub const USER_DELETED: &str = "user-service.user.deleted";

/// `user.updated` 负载：新状态加上被替换掉的邮箱
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdated {
    #[serde(flatten)]
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_email: Option<String>,
}

/// `user.deleted` 负载
///
/// 只带 id 的负载也能解码，此时平铺的邮箱键只能等 TTL 过期。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    Created(User),
    Fetched(User),
    Updated(UserUpdated),
    Deleted(UserRef),
}

impl UserEvent {
    pub fn user_id(&self) -> &UserId {
        match self {
            Self::Created(user) | Self::Fetched(user) => &user.id,
            Self::Updated(updated) => &updated.user.id,
            Self::Deleted(reference) => &reference.id,
        }
    }
}

impl FactEvent for UserEvent {
    fn routing_key(&self) -> &'static str {
        match self {
            Self::Created(_) => USER_CREATED,
            Self::Fetched(_) => USER_FETCHED,
            Self::Updated(_) => USER_UPDATED,
            Self::Deleted(_) => USER_DELETED,
        }
    }

    fn payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Created(user) | Self::Fetched(user) => encode_json(user),
            Self::Updated(updated) => encode_json(updated),
            Self::Deleted(reference) => encode_json(reference),
        }
    }
}

impl RoutedEvent for UserEvent {
    fn routing_keys() -> &'static [&'static str] {
        &[USER_CREATED, USER_FETCHED, USER_UPDATED, USER_DELETED]
    }

    fn decode(routing_key: &str, payload: &[u8]) -> Result<Option<Self>, DecodeError> {
        Ok(match routing_key {
            USER_CREATED => Some(Self::Created(decode_json(routing_key, payload)?)),
            USER_FETCHED => Some(Self::Fetched(decode_json(routing_key, payload)?)),
            USER_UPDATED => Some(Self::Updated(decode_json(routing_key, payload)?)),
            USER_DELETED => Some(Self::Deleted(decode_json(routing_key, payload)?)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new("ada@example.com", "ada").unwrap()
    }

    #[test]
    fn test_event_roundtrips_through_its_routing_key() {
        let event = UserEvent::Updated(UserUpdated {
            user: user(),
            previous_email: Some("old@example.com".to_string()),
        });

        let decoded = UserEvent::decode(event.routing_key(), &event.payload().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_updated_payload_is_the_flat_user() {
        let user = user();
        let event = UserEvent::Updated(UserUpdated {
            user: user.clone(),
            previous_email: None,
        });

        let value: serde_json::Value = serde_json::from_slice(&event.payload().unwrap()).unwrap();
        assert_eq!(value["email"], "ada@example.com");
        assert!(value.get("previous_email").is_none());

        let as_user: User = serde_json::from_value(value).unwrap();
        assert_eq!(as_user, user);
    }

    #[test]
    fn test_deleted_accepts_id_only_payload() {
        let id = UserId::new();
        let payload = format!(r#"{{"id":"{}"}}"#, id);

        let decoded = UserEvent::decode(USER_DELETED, payload.as_bytes())
            .unwrap()
            .unwrap();
        assert_eq!(decoded, UserEvent::Deleted(UserRef { id, email: None }));
    }

    #[test]
    fn test_unknown_key_and_malformed_payload() {
        assert!(UserEvent::decode("user-service.user.starred", b"{}").unwrap().is_none());
        assert!(UserEvent::decode(USER_CREATED, b"{\"id\":1}").is_err());
    }
}
