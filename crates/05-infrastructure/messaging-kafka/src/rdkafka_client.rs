//! 基于 librdkafka 的客户端实现

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use messaging_abstractions::{
    BrokerError, ConsumedMessage, ConsumerConfig, ConsumerSubscribeTopics, EachMessageHandler,
    KafkaAdmin, KafkaClient, KafkaConfig, KafkaConsumer, KafkaProducer, ProducerRecord,
    RecordMetadata, TopicSpec, TopicSubscription,
};
use parking_lot::Mutex;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// librdkafka 客户端工厂
#[derive(Debug, Clone)]
pub struct RdKafkaClient {
    config: KafkaConfig,
}

impl RdKafkaClient {
    pub fn new(config: KafkaConfig) -> Self {
        Self { config }
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.config.request_timeout_ms)
    }

    fn base_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", self.config.brokers.join(","))
            .set("client.id", &self.config.client_id)
            .set(
                "socket.connection.setup.timeout.ms",
                self.config.connection_timeout_ms.to_string(),
            )
            .set("socket.timeout.ms", self.config.request_timeout_ms.to_string());

        let protocol = match (self.config.ssl, self.config.sasl.is_some()) {
            (true, true) => Some("SASL_SSL"),
            (false, true) => Some("SASL_PLAINTEXT"),
            (true, false) => Some("SSL"),
            (false, false) => None,
        };
        if let Some(protocol) = protocol {
            client_config.set("security.protocol", protocol);
        }
        if let Some(sasl) = &self.config.sasl {
            client_config
                .set("sasl.mechanisms", &sasl.mechanism)
                .set("sasl.username", &sasl.username)
                .set("sasl.password", &sasl.password);
        }

        for (key, value) in &self.config.properties {
            client_config.set(key, value);
        }
        client_config
    }
}

impl KafkaClient for RdKafkaClient {
    fn admin(&self) -> Box<dyn KafkaAdmin> {
        Box::new(RdKafkaAdmin {
            config: self.base_config(),
            timeout: self.request_timeout(),
            client: Mutex::new(None),
        })
    }

    fn consumer(&self, config: &ConsumerConfig) -> Box<dyn KafkaConsumer> {
        let mut client_config = self.base_config();
        client_config
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "true");
        if let Some(timeout) = config.session_timeout_ms {
            client_config.set("session.timeout.ms", timeout.to_string());
        }
        if let Some(interval) = config.heartbeat_interval_ms {
            client_config.set("heartbeat.interval.ms", interval.to_string());
        }
        if let Some(allow) = config.allow_auto_topic_creation {
            client_config.set("allow.auto.create.topics", allow.to_string());
        }
        for (key, value) in &config.properties {
            client_config.set(key, value);
        }

        Box::new(RdKafkaConsumer {
            group_id: config.group_id.clone(),
            config: client_config,
            timeout: self.request_timeout(),
            consumer: Mutex::new(None),
            connected: Mutex::new(false),
            cancel: CancellationToken::new(),
        })
    }

    fn producer(&self) -> Box<dyn KafkaProducer> {
        Box::new(RdKafkaProducer {
            config: self.base_config(),
            timeout: self.request_timeout(),
            producer: Mutex::new(None),
        })
    }
}

fn protocol_error(operation: &str, error: KafkaError) -> BrokerError {
    BrokerError::protocol(operation, error.to_string())
}

struct RdKafkaAdmin {
    config: ClientConfig,
    timeout: Duration,
    client: Mutex<Option<Arc<AdminClient<DefaultClientContext>>>>,
}

impl RdKafkaAdmin {
    fn client(&self) -> Result<Arc<AdminClient<DefaultClientContext>>, BrokerError> {
        self.client.lock().clone().ok_or(BrokerError::NotConnected)
    }
}

#[async_trait]
impl KafkaAdmin for RdKafkaAdmin {
    async fn connect(&self) -> Result<(), BrokerError> {
        let client: AdminClient<DefaultClientContext> = self
            .config
            .create()
            .map_err(|e| BrokerError::connection(e.to_string()))?;
        *self.client.lock() = Some(Arc::new(client));
        Ok(())
    }

    async fn list_topics(&self) -> Result<Vec<String>, BrokerError> {
        let client = self.client()?;
        let timeout = self.timeout;
        let metadata = tokio::task::spawn_blocking(move || client.inner().fetch_metadata(None, timeout))
            .await
            .map_err(|e| BrokerError::protocol("list_topics", e.to_string()))?
            .map_err(|e| protocol_error("list_topics", e))?;

        Ok(metadata
            .topics()
            .iter()
            .map(|topic| topic.name().to_string())
            .collect())
    }

    async fn create_topics(&self, topics: &[TopicSpec]) -> Result<bool, BrokerError> {
        let client = self.client()?;
        let new_topics: Vec<NewTopic<'_>> = topics
            .iter()
            .map(|spec| {
                NewTopic::new(
                    &spec.topic,
                    spec.num_partitions,
                    TopicReplication::Fixed(spec.replication_factor),
                )
            })
            .collect();
        let options = AdminOptions::new().operation_timeout(Some(self.timeout));

        let results = client
            .create_topics(&new_topics, &options)
            .await
            .map_err(|e| protocol_error("create_topics", e))?;

        let mut created = false;
        for result in results {
            match result {
                Ok(topic) => {
                    debug!(topic = %topic, "librdkafka 已创建主题");
                    created = true;
                }
                Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    if topics.len() == 1 {
                        return Err(BrokerError::TopicAlreadyExists { topic });
                    }
                }
                Err((topic, code)) => {
                    return Err(BrokerError::protocol(
                        "create_topics",
                        format!("{}: {}", topic, code),
                    ));
                }
            }
        }
        Ok(created)
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        self.client.lock().take();
        Ok(())
    }
}

struct RdKafkaConsumer {
    group_id: String,
    config: ClientConfig,
    timeout: Duration,
    consumer: Mutex<Option<Arc<StreamConsumer>>>,
    connected: Mutex<bool>,
    cancel: CancellationToken,
}

#[async_trait]
impl KafkaConsumer for RdKafkaConsumer {
    /// librdkafka 在创建消费者时就确定 `auto.offset.reset`，
    /// 这里只探测 broker 是否可达，真正的消费者在订阅时创建
    async fn connect(&self) -> Result<(), BrokerError> {
        let probe: StreamConsumer = self
            .config
            .create()
            .map_err(|e| BrokerError::connection(e.to_string()))?;
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || probe.fetch_metadata(None, timeout).map(|_| ()))
            .await
            .map_err(|e| BrokerError::connection(e.to_string()))?
            .map_err(|e| BrokerError::connection(e.to_string()))?;

        *self.connected.lock() = true;
        Ok(())
    }

    async fn subscribe(&self, subscription: &ConsumerSubscribeTopics) -> Result<(), BrokerError> {
        if !*self.connected.lock() {
            return Err(BrokerError::NotConnected);
        }

        let reset = if subscription.from_beginning {
            "earliest"
        } else {
            "latest"
        };
        let consumer: StreamConsumer = self
            .config
            .clone()
            .set("auto.offset.reset", reset)
            .create()
            .map_err(|e| protocol_error("subscribe", e))?;

        // librdkafka 以 ^ 开头的名称识别正则订阅
        let topics: Vec<String> = subscription
            .topics
            .iter()
            .map(|topic| match topic {
                TopicSubscription::Name(name) => name.clone(),
                TopicSubscription::Pattern(pattern) if pattern.starts_with('^') => pattern.clone(),
                TopicSubscription::Pattern(pattern) => format!("^{}", pattern),
            })
            .collect();
        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .map_err(|e| protocol_error("subscribe", e))?;

        *self.consumer.lock() = Some(Arc::new(consumer));
        Ok(())
    }

    async fn run(&self, handler: EachMessageHandler) -> Result<(), BrokerError> {
        let consumer = self
            .consumer
            .lock()
            .clone()
            .ok_or_else(|| BrokerError::protocol("run", "消费者尚未订阅"))?;
        let cancel = self.cancel.clone();
        let group_id = self.group_id.clone();

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    received = consumer.recv() => received.map(|message| to_consumed(&message)),
                };
                match received {
                    Ok(message) => handler(message).await,
                    Err(e) => warn!(group_id = %group_id, error = %e, "接收 Kafka 消息失败"),
                }
            }
            debug!(group_id = %group_id, "librdkafka 消费循环已退出");
        });

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        self.cancel.cancel();
        *self.connected.lock() = false;
        if let Some(consumer) = self.consumer.lock().take() {
            consumer.unsubscribe();
        }
        Ok(())
    }

    fn group_id(&self) -> &str {
        &self.group_id
    }
}

fn to_consumed<M: Message>(message: &M) -> ConsumedMessage {
    let mut headers = BTreeMap::new();
    if let Some(message_headers) = message.headers() {
        for header in message_headers.iter() {
            if let Some(value) = header.value {
                headers.insert(header.key.to_string(), value.to_vec());
            }
        }
    }

    ConsumedMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        value: message.payload().map(<[u8]>::to_vec),
        headers,
        timestamp: message
            .timestamp()
            .to_millis()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
    }
}

struct RdKafkaProducer {
    config: ClientConfig,
    timeout: Duration,
    producer: Mutex<Option<FutureProducer>>,
}

#[async_trait]
impl KafkaProducer for RdKafkaProducer {
    async fn connect(&self) -> Result<(), BrokerError> {
        let producer: FutureProducer = self
            .config
            .create()
            .map_err(|e| BrokerError::connection(e.to_string()))?;
        *self.producer.lock() = Some(producer);
        Ok(())
    }

    async fn send(&self, record: &ProducerRecord) -> Result<Vec<RecordMetadata>, BrokerError> {
        let producer = self
            .producer
            .lock()
            .clone()
            .ok_or(BrokerError::NotConnected)?;

        let mut metadata = Vec::with_capacity(record.messages.len());
        for message in &record.messages {
            let mut future_record = FutureRecord::<[u8], [u8]>::to(&record.topic);
            if let Some(key) = &message.key {
                future_record = future_record.key(key.as_slice());
            }
            if let Some(value) = &message.value {
                future_record = future_record.payload(value.as_slice());
            }
            if let Some(partition) = message.partition {
                future_record = future_record.partition(partition);
            }
            if !message.headers.is_empty() {
                let headers = message
                    .headers
                    .iter()
                    .fold(OwnedHeaders::new(), |headers, (key, value)| {
                        headers.insert(Header {
                            key: key.as_str(),
                            value: Some(value.as_slice()),
                        })
                    });
                future_record = future_record.headers(headers);
            }

            let (partition, offset) = producer
                .send(future_record, Timeout::After(self.timeout))
                .await
                .map_err(|(e, _)| protocol_error("send", e))?;
            metadata.push(RecordMetadata {
                topic: record.topic.clone(),
                partition,
                offset,
            });
        }
        Ok(metadata)
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        let Some(producer) = self.producer.lock().take() else {
            return Ok(());
        };
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| BrokerError::protocol("flush", e.to_string()))?
            .map_err(|e| protocol_error("flush", e))
    }
}
