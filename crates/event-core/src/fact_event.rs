//! 事实事件
//!
//! 发布端：一个已经落库的变更 → (路由键, JSON 负载)。
//! 订阅端：按路由键把负载解码为每个服务自己的带标签联合体，
//! 未知路由键解码为 `None`，交给调用方记录后忽略。

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// 负载解码失败
#[derive(Debug, Error)]
#[error("malformed payload for `{routing_key}`: {message}")]
pub struct DecodeError {
    pub routing_key: String,
    pub message: String,
}

/// 可发布的事实事件
pub trait FactEvent: Send + Sync {
    /// 路由键
    fn routing_key(&self) -> &'static str;

    /// JSON 编码的负载
    fn payload(&self) -> Result<Vec<u8>, serde_json::Error>;
}

/// 按路由键解码的事件联合体
pub trait RoutedEvent: Sized + Send + Sync + 'static {
    /// 该联合体能解码的全部路由键，即订阅时绑定的键
    fn routing_keys() -> &'static [&'static str];

    /// 解码一条投递；未知路由键返回 `Ok(None)`
    fn decode(routing_key: &str, payload: &[u8]) -> Result<Option<Self>, DecodeError>;
}

/// 把负载解码为具体结构
pub fn decode_json<T: DeserializeOwned>(routing_key: &str, payload: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(payload).map_err(|e| DecodeError {
        routing_key: routing_key.to_string(),
        message: e.to_string(),
    })
}

/// 把实体编码为负载
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ping {
        id: u32,
    }

    #[test]
    fn test_decode_json_ok() {
        let ping: Ping = decode_json("svc.ping.created", br#"{"id":7}"#).unwrap();
        assert_eq!(ping, Ping { id: 7 });
    }

    #[test]
    fn test_decode_json_reports_routing_key() {
        let err = decode_json::<Ping>("svc.ping.created", b"{oops").unwrap_err();
        assert_eq!(err.routing_key, "svc.ping.created");
        assert!(err.to_string().contains("svc.ping.created"));
    }
}
