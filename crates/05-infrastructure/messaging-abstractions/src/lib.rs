//! # Messaging Abstractions
//!
//! 消息中间件抽象层，定义 Kafka 客户端协作接口和声明式消费者的数据模型。
//!
//! ## 核心接口
//!
//! - [`KafkaClient`] - 客户端工厂，创建管理端、消费者和生产者
//! - [`KafkaAdmin`] / [`KafkaConsumer`] / [`KafkaProducer`] - 三类会话
//! - [`KafkaProcessor`] - 由 `#[kafka_processor]` 生成的处理器声明表
//! - [`KafkaConsumerOptions`] - 单个处理方法声明的订阅与消费者组配置
//! - [`MessagingError`] - 封闭的错误分类

pub mod client;
pub mod config;
pub mod errors;
pub mod handler;
pub mod message;

pub use client::*;
pub use config::*;
pub use errors::*;
pub use handler::*;
pub use message::*;

/// 过程宏生成代码使用的依赖，不属于公开 API
#[doc(hidden)]
pub mod __private {
    pub use futures::future::BoxFuture;
    pub use serde_json;
    pub use std::boxed::Box;
    pub use std::sync::Arc;
    pub use std::vec::Vec;
}
