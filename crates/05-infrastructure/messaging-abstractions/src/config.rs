//! Kafka 客户端、订阅与消费者组配置

use crate::errors::MessagingError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 自动创建主题时使用的分区数
pub const DEFAULT_NUM_PARTITIONS: i32 = 1;

/// 自动创建主题时使用的副本因子
pub const DEFAULT_REPLICATION_FACTOR: i32 = 1;

/// Kafka 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KafkaConfig {
    /// 客户端标识
    pub client_id: String,
    /// Broker 地址列表（host:port）
    pub brokers: Vec<String>,
    /// 连接超时（毫秒）
    pub connection_timeout_ms: u64,
    /// 请求超时（毫秒）
    pub request_timeout_ms: u64,
    /// 是否启用 TLS
    pub ssl: bool,
    /// SASL 认证
    pub sasl: Option<SaslConfig>,
    /// 透传给底层客户端的附加属性
    pub properties: BTreeMap<String, String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            client_id: "lorn-adsp".to_string(),
            brokers: Vec::new(),
            connection_timeout_ms: 1000,
            request_timeout_ms: 30000,
            ssl: false,
            sasl: None,
            properties: BTreeMap::new(),
        }
    }
}

impl KafkaConfig {
    /// 创建指定 broker 列表的配置
    pub fn new(client_id: impl Into<String>, brokers: Vec<String>) -> Self {
        Self {
            client_id: client_id.into(),
            brokers,
            ..Self::default()
        }
    }

    /// 添加附加属性
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// 验证配置
    pub fn validate(&self) -> Result<(), MessagingError> {
        if self.client_id.trim().is_empty() {
            return Err(MessagingError::invalid_config("client_id 不能为空"));
        }

        if self.brokers.is_empty() {
            return Err(MessagingError::invalid_config("brokers 不能为空"));
        }

        for broker in &self.brokers {
            let valid = broker
                .rsplit_once(':')
                .map(|(host, port)| !host.trim().is_empty() && port.parse::<u16>().is_ok())
                .unwrap_or(false);
            if !valid {
                return Err(MessagingError::invalid_config(format!(
                    "broker 地址格式无效，应为 host:port: {}",
                    broker
                )));
            }
        }

        if let Some(sasl) = &self.sasl {
            if sasl.username.is_empty() {
                return Err(MessagingError::invalid_config("sasl.username 不能为空"));
            }
        }

        Ok(())
    }
}

/// SASL 认证配置
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct SaslConfig {
    /// 认证机制，例如 PLAIN、SCRAM-SHA-256
    pub mechanism: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SaslConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaslConfig")
            .field("mechanism", &self.mechanism)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// 订阅目标：精确主题名或正则模式
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TopicSubscription {
    Name(String),
    Pattern(String),
}

impl TopicSubscription {
    /// 精确主题名
    pub fn name(topic: impl Into<String>) -> Self {
        Self::Name(topic.into())
    }

    /// 正则模式
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::Pattern(pattern.into())
    }

    /// 主题名，模式订阅返回 `None`
    pub fn topic_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Pattern(_) => None,
        }
    }
}

impl std::fmt::Display for TopicSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Pattern(pattern) => write!(f, "/{}/", pattern),
        }
    }
}

/// 订阅选项
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumerSubscribeTopics {
    /// 订阅的主题，保持声明顺序
    pub topics: Vec<TopicSubscription>,
    /// 新消费者组是否从最早位置开始消费
    #[serde(default)]
    pub from_beginning: bool,
}

impl ConsumerSubscribeTopics {
    /// 创建订阅选项
    pub fn new(topics: Vec<TopicSubscription>) -> Self {
        Self {
            topics,
            from_beginning: false,
        }
    }

    /// 设置是否从头消费
    pub fn from_beginning(mut self, from_beginning: bool) -> Self {
        self.from_beginning = from_beginning;
        self
    }

    /// 去重后的精确主题名，保持首次出现的顺序
    pub fn topic_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.topics.iter().filter_map(TopicSubscription::topic_name) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// 消费者组配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumerConfig {
    /// 消费者组标识
    pub group_id: String,
    /// 会话超时（毫秒）
    #[serde(default)]
    pub session_timeout_ms: Option<u64>,
    /// 心跳间隔（毫秒）
    #[serde(default)]
    pub heartbeat_interval_ms: Option<u64>,
    /// 是否允许 broker 自动创建订阅的主题
    #[serde(default)]
    pub allow_auto_topic_creation: Option<bool>,
    /// 透传给底层消费者的附加属性
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl ConsumerConfig {
    /// 创建消费者组配置
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            session_timeout_ms: None,
            heartbeat_interval_ms: None,
            allow_auto_topic_creation: None,
            properties: BTreeMap::new(),
        }
    }

    /// 设置会话超时
    pub fn with_session_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.session_timeout_ms = Some(timeout_ms);
        self
    }

    /// 设置心跳间隔
    pub fn with_heartbeat_interval_ms(mut self, interval_ms: u64) -> Self {
        self.heartbeat_interval_ms = Some(interval_ms);
        self
    }

    /// 设置是否允许自动创建主题
    pub fn with_allow_auto_topic_creation(mut self, allow: bool) -> Self {
        self.allow_auto_topic_creation = Some(allow);
        self
    }

    /// 添加附加属性
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// 处理方法上声明的消费者选项
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KafkaConsumerOptions {
    pub subscribe: ConsumerSubscribeTopics,
    pub consumer_config: ConsumerConfig,
}

impl KafkaConsumerOptions {
    /// 创建消费者选项
    pub fn new(subscribe: ConsumerSubscribeTopics, consumer_config: ConsumerConfig) -> Self {
        Self {
            subscribe,
            consumer_config,
        }
    }

    /// 消费者组标识
    pub fn group_id(&self) -> &str {
        &self.consumer_config.group_id
    }
}

/// 待创建主题的描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub topic: String,
    pub num_partitions: i32,
    pub replication_factor: i32,
}

impl TopicSpec {
    /// 使用最小默认形态（1 分区、1 副本）
    pub fn with_defaults(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            num_partitions: DEFAULT_NUM_PARTITIONS,
            replication_factor: DEFAULT_REPLICATION_FACTOR,
        }
    }
}
