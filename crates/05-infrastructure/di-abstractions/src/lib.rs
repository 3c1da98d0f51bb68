//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义组件实例枚举的核心接口。
//!
//! ## 核心接口
//!
//! - [`ComponentRegistry`] - 组件注册表接口，枚举所有存活的组件实例
//! - [`ComponentInstance`] - 单个组件实例及其声明的方法

pub mod registry;

pub use registry::*;
