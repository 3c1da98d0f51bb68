//! # Messaging Kafka
//!
//! 声明式 Kafka 消费者的发现与生命周期编排。
//!
//! 启动时 [`KafkaExplorer`] 扫描组件注册表，找出 `#[kafka_processor]` 组件上
//! 用 `#[kafka_consumer]` 声明的处理方法：
//!
//! 1. 校验 groupId 在进程内唯一，冲突时在任何 I/O 之前中止启动
//! 2. 并发确保所有订阅主题存在（缺失时以 1 分区、1 副本创建）
//! 3. 并发为每个处理方法绑定一个独立的消费者会话
//!
//! 关闭时并发断开全部会话，单个失败不影响其他会话。
//!
//! [`InMemoryKafka`] 提供进程内实现；启用 `rdkafka` feature 后可使用
//! 基于 librdkafka 的 `RdKafkaClient`。

pub mod accessor;
pub mod binder;
pub mod descriptor;
pub mod explorer;
pub mod group_registry;
pub mod memory;
pub mod producer;
pub mod provisioner;
pub mod session;

#[cfg(feature = "rdkafka")]
pub mod rdkafka_client;

pub use accessor::KafkaMetadataAccessor;
pub use binder::{decode_payload, dispatch, each_message_handler, ConsumerBinder};
pub use descriptor::HandlerDescriptor;
pub use explorer::{BootstrapReport, KafkaExplorer, ShutdownReport};
pub use group_registry::GroupIdRegistry;
pub use memory::{BrokerStats, InMemoryKafka};
pub use producer::KafkaProducerService;
pub use provisioner::TopicProvisioner;
pub use session::{ConsumerSession, SessionSet, SessionState};

#[cfg(feature = "rdkafka")]
pub use rdkafka_client::RdKafkaClient;
