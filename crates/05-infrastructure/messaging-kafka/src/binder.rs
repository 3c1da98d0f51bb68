//! 消费者绑定与逐条消息分发

use crate::descriptor::HandlerDescriptor;
use crate::session::{ConsumerSession, SessionSet, SessionState};
use futures::FutureExt;
use messaging_abstractions::{
    BrokerError, ConsumedMessage, EachMessageHandler, HandlerError, KafkaClient, MessagingError,
};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info};

/// 为处理方法建立消费者会话
#[derive(Clone)]
pub struct ConsumerBinder {
    client: Arc<dyn KafkaClient>,
    sessions: Arc<SessionSet>,
}

impl ConsumerBinder {
    pub fn new(client: Arc<dyn KafkaClient>, sessions: Arc<SessionSet>) -> Self {
        Self { client, sessions }
    }

    /// 连接、订阅并启动消费循环
    ///
    /// 成功后会话加入编排器持有的会话列表；任何一步失败都不会留下会话
    pub async fn bind(
        &self,
        descriptor: Arc<HandlerDescriptor>,
    ) -> Result<Arc<ConsumerSession>, MessagingError> {
        let consumer = self.client.consumer(&descriptor.options.consumer_config);
        let session = ConsumerSession::new(descriptor.clone(), consumer);

        match Self::start(&session, &descriptor).await {
            Ok(()) => {
                session.transition(SessionState::Running);
                let session = Arc::new(session);
                self.sessions.push(session.clone());
                info!(
                    group_id = %descriptor.group_id(),
                    handler = %descriptor.location,
                    topics = ?descriptor.options.subscribe.topics,
                    "Kafka 消费者已启动"
                );
                Ok(session)
            }
            Err(source) => {
                if let Err(e) = session.consumer().disconnect().await {
                    debug!(group_id = %descriptor.group_id(), error = %e, "释放未完成绑定的消费者失败");
                }
                session.transition(SessionState::Disconnected);

                let error = MessagingError::Bind {
                    group_id: descriptor.group_id().to_string(),
                    handler: descriptor.location.clone(),
                    source,
                };
                error!(group_id = %descriptor.group_id(), "{}", error);
                Err(error)
            }
        }
    }

    async fn start(session: &ConsumerSession, descriptor: &Arc<HandlerDescriptor>) -> Result<(), BrokerError> {
        session.transition(SessionState::Connecting);
        session.consumer().connect().await?;
        session
            .consumer()
            .subscribe(&descriptor.options.subscribe)
            .await?;
        session.transition(SessionState::Subscribed);
        session
            .consumer()
            .run(each_message_handler(descriptor.clone()))
            .await
    }
}

/// 构造会话的逐条消息回调；处理失败只记录日志，不影响后续消息
pub fn each_message_handler(descriptor: Arc<HandlerDescriptor>) -> EachMessageHandler {
    Arc::new(move |message: ConsumedMessage| {
        let descriptor = descriptor.clone();
        async move {
            if let Err(error) = dispatch(&descriptor, message).await {
                error!(
                    group_id = %descriptor.group_id(),
                    handler = %descriptor.location,
                    options = ?descriptor.options,
                    error = %error,
                    "Kafka 消息处理失败"
                );
            }
        }
        .boxed()
    })
}

/// 解码消息体并调用处理方法
///
/// 空消息体解码为 `null`；处理方法返回错误或 panic 都转换为 [`MessagingError::Message`]
pub async fn dispatch(
    descriptor: &HandlerDescriptor,
    message: ConsumedMessage,
) -> Result<(), MessagingError> {
    let topic = message.topic.clone();
    let partition = message.partition;
    let offset = message.offset;
    let failure = |source: HandlerError| MessagingError::Message {
        topic: topic.clone(),
        partition,
        offset,
        source,
    };

    let value = decode_payload(message.value.as_deref()).map_err(|e| failure(Box::new(e)))?;

    let invoke = descriptor.invoke.clone();
    let invocation = async move { invoke(value, message).await };

    match AssertUnwindSafe(invocation).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(handler_error)) => Err(failure(handler_error)),
        Err(panic_error) => {
            let panic_msg = if let Some(s) = panic_error.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_error.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            Err(failure(format!("处理方法 panic: {}", panic_msg).into()))
        }
    }
}

/// 把消息体解码为 JSON，缺失或为空时返回 `null`
pub fn decode_payload(payload: Option<&[u8]>) -> Result<Value, serde_json::Error> {
    match payload {
        Some(bytes) if !bytes.is_empty() => serde_json::from_slice(bytes),
        _ => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messaging_abstractions::{
        ConsumerConfig, ConsumerSubscribeTopics, HandlerLocation, HandlerResult,
        KafkaConsumerOptions, MessageHandler, TopicSubscription,
    };
    use futures::future::BoxFuture;
    use parking_lot::Mutex;

    fn descriptor(invoke: MessageHandler) -> HandlerDescriptor {
        HandlerDescriptor::new(
            HandlerLocation::new("app", "Orders", "on_created"),
            KafkaConsumerOptions::new(
                ConsumerSubscribeTopics::new(vec![TopicSubscription::name("orders")]),
                ConsumerConfig::new("g1"),
            ),
            invoke,
        )
    }

    fn recording() -> (MessageHandler, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: MessageHandler = Arc::new(move |value: Value, _message: ConsumedMessage| {
            sink.lock().push(value);
            async { Ok::<(), HandlerError>(()) }.boxed()
        });
        (handler, seen)
    }

    #[test]
    fn test_decode_payload() {
        assert_eq!(decode_payload(None).unwrap(), Value::Null);
        assert_eq!(decode_payload(Some(b"")).unwrap(), Value::Null);
        assert_eq!(
            decode_payload(Some(br#"{"id":1}"#)).unwrap(),
            serde_json::json!({"id": 1})
        );
        assert!(decode_payload(Some(b"not json")).is_err());
    }

    #[tokio::test]
    async fn test_empty_payload_delivered_as_null() {
        let (handler, seen) = recording();
        let descriptor = descriptor(handler);

        dispatch(&descriptor, ConsumedMessage::new("orders", None))
            .await
            .unwrap();
        assert_eq!(*seen.lock(), vec![Value::Null]);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_message_failure() {
        let (handler, seen) = recording();
        let descriptor = descriptor(handler);

        let mut message = ConsumedMessage::new("orders", Some(b"{oops".to_vec()));
        message.offset = 42;
        let error = dispatch(&descriptor, message).await.unwrap_err();

        assert!(matches!(error, MessagingError::Message { offset: 42, .. }));
        assert!(seen.lock().is_empty());
    }

    fn panicking(_value: Value, _message: ConsumedMessage) -> BoxFuture<'static, HandlerResult> {
        async { panic!("boom") }.boxed()
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let descriptor = descriptor(Arc::new(panicking));

        let error = dispatch(&descriptor, ConsumedMessage::new("orders", None))
            .await
            .unwrap_err();
        assert!(error.to_string().contains("boom"));
    }
}
