//! 消费与生产的消息模型

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// 消费到的一条原始消息
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: BTreeMap<String, Vec<u8>>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ConsumedMessage {
    /// 创建只有主题和消息体的消息
    pub fn new(topic: impl Into<String>, value: Option<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            partition: 0,
            offset: 0,
            key: None,
            value,
            headers: BTreeMap::new(),
            timestamp: None,
        }
    }

    /// 以 UTF-8 解析 key
    pub fn key_str(&self) -> Option<&str> {
        self.key
            .as_deref()
            .and_then(|key| std::str::from_utf8(key).ok())
    }

    /// 消息体是否为空
    pub fn is_empty(&self) -> bool {
        self.value.as_ref().map_or(true, |value| value.is_empty())
    }
}

/// 待发送的一条消息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProducerMessage {
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub partition: Option<i32>,
    pub headers: BTreeMap<String, Vec<u8>>,
}

impl ProducerMessage {
    /// 创建消息
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// 序列化为 JSON 消息体
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_vec(value)?))
    }

    /// 设置 key
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// 指定分区
    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }

    /// 添加消息头
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// 发送请求
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerRecord {
    pub topic: String,
    pub messages: Vec<ProducerMessage>,
}

impl ProducerRecord {
    pub fn new(topic: impl Into<String>, messages: Vec<ProducerMessage>) -> Self {
        Self {
            topic: topic.into(),
            messages,
        }
    }
}

/// 发送结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}
