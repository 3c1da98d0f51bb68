//! # Component Macros
//!
//! 组件与 Kafka 处理器的声明宏。
//!
//! ## 核心宏
//!
//! - [`Component`](derive@Component) - 为结构体实现 `Component` trait
//! - [`kafka_processor`] - 把 impl 块标记为 Kafka 处理器
//! - [`kafka_consumer`] - 在处理器方法上声明订阅与消费者组
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use component_macros::{kafka_processor, Component};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! pub struct OrderCreated {
//!     pub id: u64,
//! }
//!
//! #[derive(Debug, Component)]
//! #[component(name = "order-processor", priority = 10)]
//! pub struct OrderProcessor;
//!
//! #[kafka_processor]
//! impl OrderProcessor {
//!     #[kafka_consumer(topics = ["orders"], group_id = "order-service")]
//!     async fn on_created(&self, event: OrderCreated) -> Result<(), std::io::Error> {
//!         Ok(())
//!     }
//! }
//! ```

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput, ItemImpl};

mod component;
mod consumer;
mod processor;
mod utils;

/// 组件派生宏
///
/// 未指定名称时使用结构体名的 kebab-case 形式。
///
/// # 参数
///
/// - `name = "custom-name"` - 自定义组件名称
/// - `priority = N` - 组件优先级（默认为 0）
/// - `disabled` - 注册但不参与枚举
#[proc_macro_derive(Component, attributes(component))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    component::derive_component_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Kafka 处理器宏
///
/// 用于固有 impl 块。块内带 `#[kafka_consumer]` 的方法成为消息处理方法，
/// 其签名必须是 `async fn(&self, payload: T)` 或
/// `async fn(&self, payload: T, message: ConsumedMessage)`，
/// `T` 实现 `DeserializeOwned`，返回 `Result<(), E>` 且 `E: Into<HandlerError>`。
#[proc_macro_attribute]
pub fn kafka_processor(args: TokenStream, input: TokenStream) -> TokenStream {
    let item = parse_macro_input!(input as ItemImpl);
    processor::expand(args.into(), item)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Kafka 消费者声明
///
/// 只能出现在 `#[kafka_processor]` impl 块内，由外层宏读取。
///
/// # 参数
///
/// - `topics = ["a", "b"]` - 精确主题名，启动时确保存在
/// - `patterns = ["^audit\\..*"]` - 正则订阅，不做预置
/// - `group_id = "group"` - 消费者组，进程内唯一（必填）
/// - `from_beginning` - 新消费者组从最早位置开始消费
/// - `session_timeout_ms = N` / `heartbeat_interval_ms = N`
/// - `allow_auto_topic_creation = bool`
#[proc_macro_attribute]
pub fn kafka_consumer(_args: TokenStream, input: TokenStream) -> TokenStream {
    let mut output: TokenStream = syn::Error::new(
        proc_macro2::Span::call_site(),
        "kafka_consumer 只能用于 #[kafka_processor] impl 块中的方法",
    )
    .to_compile_error()
    .into();
    output.extend(input);
    output
}
