//! Kafka 客户端协作接口
//!
//! 连接、订阅、消费循环、主题管理等具体协议实现都委托给这些 trait 的实现者。
//! 每个 I/O 操作都是挂起点，调用方不持有任何锁跨越这些调用。

use crate::config::{ConsumerConfig, ConsumerSubscribeTopics, TopicSpec};
use crate::errors::BrokerError;
use crate::message::{ConsumedMessage, ProducerRecord, RecordMetadata};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

/// 逐条消息回调
///
/// 返回的 future 完成之前，同一会话不会投递下一条消息
pub type EachMessageHandler = Arc<dyn Fn(ConsumedMessage) -> BoxFuture<'static, ()> + Send + Sync>;

/// Kafka 客户端工厂
pub trait KafkaClient: Send + Sync {
    /// 创建管理端会话
    fn admin(&self) -> Box<dyn KafkaAdmin>;

    /// 按消费者组配置创建消费者会话
    fn consumer(&self, config: &ConsumerConfig) -> Box<dyn KafkaConsumer>;

    /// 创建生产者会话
    fn producer(&self) -> Box<dyn KafkaProducer>;
}

/// 管理端会话
#[async_trait]
pub trait KafkaAdmin: Send + Sync {
    async fn connect(&self) -> Result<(), BrokerError>;

    /// 列出现有主题
    async fn list_topics(&self) -> Result<Vec<String>, BrokerError>;

    /// 创建主题，返回是否真正创建了新主题
    async fn create_topics(&self, topics: &[TopicSpec]) -> Result<bool, BrokerError>;

    async fn disconnect(&self) -> Result<(), BrokerError>;
}

/// 消费者会话
#[async_trait]
pub trait KafkaConsumer: Send + Sync {
    async fn connect(&self) -> Result<(), BrokerError>;

    async fn subscribe(&self, subscription: &ConsumerSubscribeTopics) -> Result<(), BrokerError>;

    /// 启动消费循环后立即返回，循环在后台运行直到断开
    async fn run(&self, handler: EachMessageHandler) -> Result<(), BrokerError>;

    /// 停止消费循环并断开；正在执行的回调不会被强制中止
    async fn disconnect(&self) -> Result<(), BrokerError>;

    /// 消费者组标识
    fn group_id(&self) -> &str;
}

/// 生产者会话
#[async_trait]
pub trait KafkaProducer: Send + Sync {
    async fn connect(&self) -> Result<(), BrokerError>;

    async fn send(&self, record: &ProducerRecord) -> Result<Vec<RecordMetadata>, BrokerError>;

    async fn disconnect(&self) -> Result<(), BrokerError>;
}
