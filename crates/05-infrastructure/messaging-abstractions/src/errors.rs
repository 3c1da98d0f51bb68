//! 消息组件错误类型定义

use crate::handler::HandlerError;
use thiserror::Error;

/// 客户端协作层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("客户端未连接")]
    NotConnected,

    #[error("连接 Kafka 失败: {message}")]
    Connection { message: String },

    #[error("主题已存在: {topic}")]
    TopicAlreadyExists { topic: String },

    #[error("主题不存在: {topic}")]
    UnknownTopic { topic: String },

    #[error("Kafka 协议错误 ({operation}): {message}")]
    Protocol { operation: String, message: String },
}

impl BrokerError {
    /// 创建连接错误
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// 创建协议错误
    pub fn protocol(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// 处理方法在应用中的位置，用于诊断输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerLocation {
    /// 所属模块路径
    pub module: String,
    /// 组件名称
    pub component: String,
    /// 方法名称
    pub method: String,
}

impl HandlerLocation {
    pub fn new(
        module: impl Into<String>,
        component: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            component: component.into(),
            method: method.into(),
        }
    }
}

impl std::fmt::Display for HandlerLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} > {} > {}", self.module, self.component, self.method)
    }
}

/// 消息组件错误类型
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error(
        "检测到重复的 Kafka 消费者 groupId '{group_id}'，同一进程内不能绑定多个相同 groupId 的消费者: {existing} 与 {conflicting}"
    )]
    DuplicateGroupId {
        group_id: String,
        existing: HandlerLocation,
        conflicting: HandlerLocation,
    },

    #[error("无效的 Kafka 配置: {message}")]
    InvalidConfig { message: String },

    #[error("确保主题存在失败: {topic}, 原因: {source}")]
    Provisioning { topic: String, source: BrokerError },

    #[error("绑定消费者失败: groupId={group_id}, 处理方法={handler}, 原因: {source}")]
    Bind {
        group_id: String,
        handler: HandlerLocation,
        source: BrokerError,
    },

    #[error("消息处理失败: topic={topic}, partition={partition}, offset={offset}, 原因: {source}")]
    Message {
        topic: String,
        partition: i32,
        offset: i64,
        source: HandlerError,
    },

    #[error("断开消费者失败: groupId={group_id}, 原因: {source}")]
    Disconnect { group_id: String, source: BrokerError },

    #[error("生产者错误: {source}")]
    Producer { source: BrokerError },
}

impl MessagingError {
    /// 创建配置错误
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// 是否为致命的配置类错误
    pub fn is_configuration_conflict(&self) -> bool {
        matches!(
            self,
            Self::DuplicateGroupId { .. } | Self::InvalidConfig { .. }
        )
    }
}
