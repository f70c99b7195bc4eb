//! 路由键与 Kafka topic 之间的映射

use quizzler_event_core::is_wildcard;

/// topic 命名
///
/// 交换机名称作为所有 topic 的前缀：`<exchange>.<routing_key>`；
/// 为空时 topic 与路由键相同。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicNamer {
    exchange: String,
}

impl TopicNamer {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// 路由键对应的 topic
    pub fn topic_for(&self, routing_key: &str) -> String {
        if self.exchange.is_empty() {
            routing_key.to_string()
        } else {
            format!("{}.{}", self.exchange, routing_key)
        }
    }

    /// 由 topic 还原路由键；不属于本交换机的 topic 返回 `None`
    pub fn routing_key<'a>(&self, topic: &'a str) -> Option<&'a str> {
        if self.exchange.is_empty() {
            return Some(topic);
        }
        topic
            .strip_prefix(self.exchange.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|rest| !rest.is_empty())
    }

    /// 绑定模式对应的订阅表达式
    ///
    /// 字面路由键直接订阅 topic；含 `*`/`#` 的模式转换为
    /// librdkafka 的正则订阅（以 `^` 开头）。
    pub fn subscription(&self, pattern: &str) -> String {
        if !is_wildcard(pattern) {
            return self.topic_for(pattern);
        }

        let mut re = String::from("^");
        let mut need_sep = false;
        if !self.exchange.is_empty() {
            push_literal(&mut re, &self.exchange);
            need_sep = true;
        }

        let segments: Vec<&str> = pattern.split('.').collect();
        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            match *segment {
                "#" if need_sep => re.push_str(r"(?:\.[^.]+)*"),
                "#" if i == last => re.push_str(r"(?:[^.]+(?:\.[^.]+)*)?"),
                "#" => re.push_str(r"(?:[^.]+\.)*"),
                "*" => {
                    if need_sep {
                        re.push_str(r"\.");
                    }
                    re.push_str("[^.]+");
                    need_sep = true;
                }
                literal => {
                    if need_sep {
                        re.push_str(r"\.");
                    }
                    push_literal(&mut re, literal);
                    need_sep = true;
                }
            }
        }

        re.push('$');
        re
    }
}

fn push_literal(re: &mut String, literal: &str) {
    for c in literal.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            re.push(c);
        } else {
            re.push('\\');
            re.push(c);
        }
    }
}
