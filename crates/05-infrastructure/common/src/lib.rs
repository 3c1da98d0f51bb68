//! # Infrastructure Common
//!
//! 这个 crate 提供了 Lorn ADSP 平台基础设施层的公共 traits 和工具。
//!
//! ## 核心组件
//!
//! - [`Component`] - 组件基础 trait
//! - [`TypeInfo`] - 组件类型信息
//! - [`Lifecycle`] - 组件生命周期管理
//! - [`HealthCheckable`] - 健康检查 trait
//!
//! ## 设计原则
//!
//! - 基于 Rust 类型系统的编译时安全
//! - 异步优先的设计理念
//! - 显式装配，不依赖全局状态

pub mod component;
pub mod errors;
pub mod health;
pub mod lifecycle;
pub mod metadata;

pub use component::*;
pub use errors::*;
pub use health::*;
pub use lifecycle::*;
pub use metadata::*;
