//! 声明式消息处理方法

use crate::config::KafkaConsumerOptions;
use crate::message::ConsumedMessage;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// 处理方法返回的错误
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// 处理方法的结果
pub type HandlerResult = Result<(), HandlerError>;

/// 绑定到具体实例的处理方法：接收解码后的 JSON 值和原始消息
pub type MessageHandler =
    Arc<dyn Fn(Value, ConsumedMessage) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// 未绑定实例的处理方法
pub type ConsumerInvoker<T> = fn(Arc<T>, Value, ConsumedMessage) -> BoxFuture<'static, HandlerResult>;

/// 处理器类型上的一个消费者方法声明
pub struct ConsumerMethod<T> {
    /// 方法名称
    pub name: &'static str,
    /// 声明的订阅与消费者组配置
    pub options: KafkaConsumerOptions,
    /// 调用入口
    pub invoker: ConsumerInvoker<T>,
}

impl<T: Send + Sync + 'static> ConsumerMethod<T> {
    pub fn new(name: &'static str, options: KafkaConsumerOptions, invoker: ConsumerInvoker<T>) -> Self {
        Self {
            name,
            options,
            invoker,
        }
    }

    /// 绑定到具体实例
    pub fn bind(&self, instance: Arc<T>) -> MessageHandler {
        let invoker = self.invoker;
        Arc::new(move |value: Value, message: ConsumedMessage| {
            invoker(instance.clone(), value, message)
        })
    }
}

impl<T> Clone for ConsumerMethod<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            options: self.options.clone(),
            invoker: self.invoker,
        }
    }
}

impl<T> std::fmt::Debug for ConsumerMethod<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerMethod")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}

/// 可承载消息处理方法的处理器组件
///
/// 通常由 `#[kafka_processor]` 生成，也可以手写实现
pub trait KafkaProcessor: Send + Sync + Sized + 'static {
    /// 组件的全部方法名称
    fn method_names() -> Vec<&'static str>;

    /// 声明了消费者选项的方法
    fn consumer_methods() -> Vec<ConsumerMethod<Self>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConsumerConfig, ConsumerSubscribeTopics, TopicSubscription};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        seen: AtomicUsize,
    }

    impl Counter {
        fn invoke(this: Arc<Self>, value: Value, _message: ConsumedMessage) -> BoxFuture<'static, HandlerResult> {
            Box::pin(async move {
                if value.is_null() {
                    return Err("null payload".into());
                }
                this.seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_bound_handler_invokes_instance() {
        let options = KafkaConsumerOptions::new(
            ConsumerSubscribeTopics::new(vec![TopicSubscription::name("t1")]),
            ConsumerConfig::new("g1"),
        );
        let method = ConsumerMethod::new("invoke", options, Counter::invoke);
        let counter = Arc::new(Counter {
            seen: AtomicUsize::new(0),
        });

        let handler = method.clone().bind(counter.clone());
        handler(serde_json::json!({"a": 1}), ConsumedMessage::new("t1", None))
            .await
            .unwrap();
        assert!(handler(Value::Null, ConsumedMessage::new("t1", None)).await.is_err());

        assert_eq!(counter.seen.load(Ordering::SeqCst), 1);
        assert_eq!(method.options.group_id(), "g1");
    }
}
