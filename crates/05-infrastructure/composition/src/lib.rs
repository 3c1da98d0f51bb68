//! # 基础设施组合层
//!
//! 把配置、组件容器、处理器元数据和 broker 客户端组装成一个可启动的
//! [`MessagingInfrastructure`]。
//!
//! ## 主要功能
//!
//! - **构建器**: 使用建造者模式注册处理器与组件
//! - **配置源管理**: TOML / JSON / YAML 文件与环境变量按顺序叠加
//! - **生命周期管理**: 先连接生产者再启动消费者，关闭时顺序相反
//!
//! ## 基本使用
//!
//! ```rust,ignore
//! use infrastructure_composition::MessagingInfrastructure;
//! use messaging_kafka::InMemoryKafka;
//! use std::sync::Arc;
//!
//! let infrastructure = MessagingInfrastructure::builder()
//!     .add_config_toml("config/app.toml")?
//!     .add_config_env_vars("ADSP")
//!     .with_client(Arc::new(InMemoryKafka::new()))
//!     .register_processor(Arc::new(OrderProcessor::default()))?
//!     .build()
//!     .await?;
//!
//! infrastructure.start().await?;
//! // ...
//! infrastructure.stop().await?;
//! ```

pub mod builder;
pub mod config_sources;
pub mod infrastructure;

#[cfg(test)]
mod tests;

pub use builder::{LoggingConfig, MessagingInfrastructureBuilder};
pub use config_sources::{ConfigSourceDescriptor, ConfigSourceType, ConfigSources};
pub use infrastructure::{InfrastructureMetrics, InfrastructureStatus, MessagingInfrastructure};

// 重新导出错误类型
pub use infrastructure_common::InfrastructureError;
