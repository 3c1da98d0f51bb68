//! Kafka 生产者服务

use async_trait::async_trait;
use infrastructure_common::{Lifecycle, LifecycleState};
use messaging_abstractions::{
    BrokerError, KafkaClient, KafkaConfig, KafkaProducer, MessagingError, ProducerMessage,
    ProducerRecord, RecordMetadata,
};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

/// 应用侧的消息发送入口
///
/// 必须先 [`connect`](Self::connect) 才能发送；断开是幂等的
pub struct KafkaProducerService {
    client_id: String,
    producer: Box<dyn KafkaProducer>,
    state: RwLock<LifecycleState>,
}

impl KafkaProducerService {
    pub fn new(client: &dyn KafkaClient, config: &KafkaConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            producer: client.producer(),
            state: RwLock::new(LifecycleState::Uninitialized),
        }
    }

    pub async fn connect(&self) -> Result<(), MessagingError> {
        if self.is_connected() {
            return Ok(());
        }

        *self.state.write() = LifecycleState::Initializing;
        match self.producer.connect().await {
            Ok(()) => {
                *self.state.write() = LifecycleState::Running;
                info!(client_id = %self.client_id, "Kafka 生产者已连接");
                Ok(())
            }
            Err(source) => {
                *self.state.write() = LifecycleState::Error;
                Err(MessagingError::Producer { source })
            }
        }
    }

    /// 发送一批消息
    pub async fn send(&self, record: ProducerRecord) -> Result<Vec<RecordMetadata>, MessagingError> {
        if !self.is_connected() {
            return Err(MessagingError::Producer {
                source: BrokerError::NotConnected,
            });
        }

        let metadata = self
            .producer
            .send(&record)
            .await
            .map_err(|source| MessagingError::Producer { source })?;
        debug!(topic = %record.topic, messages = record.messages.len(), "Kafka 消息已发送");
        Ok(metadata)
    }

    /// 把值序列化为 JSON 后发送
    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        topic: &str,
        key: Option<&str>,
        value: &T,
    ) -> Result<RecordMetadata, MessagingError> {
        let mut message = ProducerMessage::json(value).map_err(|e| MessagingError::Producer {
            source: BrokerError::protocol("encode", e.to_string()),
        })?;
        if let Some(key) = key {
            message = message.with_key(key);
        }

        self.send(ProducerRecord::new(topic, vec![message]))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MessagingError::Producer {
                source: BrokerError::protocol("send", "broker 未返回发送结果"),
            })
    }

    pub async fn disconnect(&self) -> Result<(), MessagingError> {
        if !self.is_connected() {
            return Ok(());
        }

        *self.state.write() = LifecycleState::Stopping;
        let result = self.producer.disconnect().await;
        *self.state.write() = LifecycleState::Stopped;

        match result {
            Ok(()) => {
                info!(client_id = %self.client_id, "Kafka 生产者已断开");
                Ok(())
            }
            Err(source) => {
                warn!(client_id = %self.client_id, error = %source, "断开 Kafka 生产者失败");
                Err(MessagingError::Producer { source })
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.state.read() == LifecycleState::Running
    }
}

impl std::fmt::Debug for KafkaProducerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaProducerService")
            .field("client_id", &self.client_id)
            .field("state", &*self.state.read())
            .finish()
    }
}

#[async_trait]
impl Lifecycle for KafkaProducerService {
    async fn on_start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.connect().await?;
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.disconnect().await?;
        Ok(())
    }

    fn lifecycle_state(&self) -> LifecycleState {
        *self.state.read()
    }
}
