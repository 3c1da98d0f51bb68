//! 进程内 Kafka 实现
//!
//! 用于测试和本地演示：主题、消息和消费者组都保存在内存中，
//! 同时记录各类调用次数并支持按 groupId / 主题注入失败。

use async_trait::async_trait;
use chrono::Utc;
use messaging_abstractions::{
    BrokerError, ConsumedMessage, ConsumerConfig, ConsumerSubscribeTopics, EachMessageHandler,
    KafkaAdmin, KafkaClient, KafkaConsumer, KafkaProducer, ProducerMessage, ProducerRecord,
    RecordMetadata, TopicSpec, TopicSubscription, DEFAULT_NUM_PARTITIONS,
};
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// 调用次数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub admin_connects: usize,
    pub admin_disconnects: usize,
    pub create_topic_calls: usize,
    pub consumer_connects: usize,
    pub consumer_disconnects: usize,
    pub published: usize,
}

#[derive(Default)]
struct Counters {
    admin_connects: AtomicUsize,
    admin_disconnects: AtomicUsize,
    create_topic_calls: AtomicUsize,
    consumer_connects: AtomicUsize,
    consumer_disconnects: AtomicUsize,
    published: AtomicUsize,
}

#[derive(Default)]
struct FaultPlan {
    admin_connect: bool,
    consumer_connect: HashSet<String>,
    subscribe: HashSet<String>,
    disconnect: HashSet<String>,
    create_topic: HashSet<String>,
}

struct TopicLog {
    partitions: i32,
    messages: Vec<ConsumedMessage>,
}

impl TopicLog {
    fn new(partitions: i32) -> Self {
        Self {
            partitions,
            messages: Vec::new(),
        }
    }
}

#[derive(Clone)]
enum TopicMatcher {
    Name(String),
    Pattern(Regex),
}

impl TopicMatcher {
    fn compile(subscription: &TopicSubscription) -> Result<Self, BrokerError> {
        match subscription {
            TopicSubscription::Name(name) => Ok(Self::Name(name.clone())),
            TopicSubscription::Pattern(pattern) => Regex::new(pattern)
                .map(Self::Pattern)
                .map_err(|e| BrokerError::protocol("subscribe", e.to_string())),
        }
    }

    fn matches(&self, topic: &str) -> bool {
        match self {
            Self::Name(name) => name == topic,
            Self::Pattern(regex) => regex.is_match(topic),
        }
    }
}

#[derive(Clone)]
struct Subscription {
    matchers: Vec<TopicMatcher>,
    from_beginning: bool,
}

impl Subscription {
    fn matches(&self, topic: &str) -> bool {
        self.matchers.iter().any(|matcher| matcher.matches(topic))
    }
}

struct GroupMember {
    member_id: Uuid,
    group_id: String,
    subscription: Subscription,
    sender: mpsc::UnboundedSender<ConsumedMessage>,
}

#[derive(Default)]
struct BrokerState {
    topics: BTreeMap<String, TopicLog>,
    members: Vec<GroupMember>,
}

#[derive(Default)]
struct BrokerInner {
    state: Mutex<BrokerState>,
    counters: Counters,
    faults: Mutex<FaultPlan>,
}

/// 进程内 Kafka
///
/// 克隆共享同一份状态。同一消费者组内每条消息只投递一次，
/// 每个消费者会话按顺序逐条处理。
#[derive(Clone, Default)]
pub struct InMemoryKafka {
    inner: Arc<BrokerInner>,
}

impl InMemoryKafka {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接创建主题，不计入 `create_topic_calls`
    pub fn create_topic(&self, topic: &str, partitions: i32) -> bool {
        let mut state = self.inner.state.lock();
        if state.topics.contains_key(topic) {
            return false;
        }
        state
            .topics
            .insert(topic.to_string(), TopicLog::new(partitions.max(1)));
        true
    }

    pub fn topics(&self) -> Vec<String> {
        self.inner.state.lock().topics.keys().cloned().collect()
    }

    pub fn partitions(&self, topic: &str) -> Option<i32> {
        self.inner
            .state
            .lock()
            .topics
            .get(topic)
            .map(|log| log.partitions)
    }

    /// 主题中已追加的消息
    pub fn messages(&self, topic: &str) -> Vec<ConsumedMessage> {
        self.inner
            .state
            .lock()
            .topics
            .get(topic)
            .map(|log| log.messages.clone())
            .unwrap_or_default()
    }

    /// 追加一条消息并投递给订阅该主题的消费者组
    ///
    /// 主题不存在时按默认分区数自动创建
    pub fn publish(&self, topic: &str, message: ProducerMessage) -> Result<RecordMetadata, BrokerError> {
        let mut guard = self.inner.state.lock();
        let BrokerState { topics, members } = &mut *guard;

        let log = topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicLog::new(DEFAULT_NUM_PARTITIONS));
        let partition = message.partition.unwrap_or(0);
        if partition < 0 || partition >= log.partitions {
            return Err(BrokerError::protocol(
                "produce",
                format!("主题 {} 没有分区 {}", topic, partition),
            ));
        }

        let offset = log
            .messages
            .iter()
            .filter(|existing| existing.partition == partition)
            .count() as i64;
        let consumed = ConsumedMessage {
            topic: topic.to_string(),
            partition,
            offset,
            key: message.key,
            value: message.value,
            headers: message.headers,
            timestamp: Some(Utc::now()),
        };
        log.messages.push(consumed.clone());

        let mut delivered: Vec<&str> = Vec::new();
        for member in members.iter() {
            if delivered.contains(&member.group_id.as_str()) || !member.subscription.matches(topic) {
                continue;
            }
            if member.sender.send(consumed.clone()).is_ok() {
                delivered.push(&member.group_id);
            }
        }

        self.inner.counters.published.fetch_add(1, Ordering::SeqCst);
        Ok(RecordMetadata {
            topic: topic.to_string(),
            partition,
            offset,
        })
    }

    /// 以 JSON 消息体追加消息
    pub fn publish_json<T: Serialize + ?Sized>(
        &self,
        topic: &str,
        value: &T,
    ) -> Result<RecordMetadata, BrokerError> {
        let message =
            ProducerMessage::json(value).map_err(|e| BrokerError::protocol("encode", e.to_string()))?;
        self.publish(topic, message)
    }

    /// 当前有活动成员的消费者组
    pub fn active_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self
            .inner
            .state
            .lock()
            .members
            .iter()
            .map(|member| member.group_id.clone())
            .collect();
        groups.sort();
        groups.dedup();
        groups
    }

    pub fn stats(&self) -> BrokerStats {
        let counters = &self.inner.counters;
        BrokerStats {
            admin_connects: counters.admin_connects.load(Ordering::SeqCst),
            admin_disconnects: counters.admin_disconnects.load(Ordering::SeqCst),
            create_topic_calls: counters.create_topic_calls.load(Ordering::SeqCst),
            consumer_connects: counters.consumer_connects.load(Ordering::SeqCst),
            consumer_disconnects: counters.consumer_disconnects.load(Ordering::SeqCst),
            published: counters.published.load(Ordering::SeqCst),
        }
    }

    /// 让管理端连接失败
    pub fn fail_admin_connect(&self, fail: bool) {
        self.inner.faults.lock().admin_connect = fail;
    }

    /// 让指定消费者组连接失败
    pub fn fail_consumer_connect(&self, group_id: &str) {
        self.inner
            .faults
            .lock()
            .consumer_connect
            .insert(group_id.to_string());
    }

    /// 让指定消费者组订阅失败
    pub fn fail_subscribe(&self, group_id: &str) {
        self.inner
            .faults
            .lock()
            .subscribe
            .insert(group_id.to_string());
    }

    /// 让指定消费者组断开时报错（会话仍会停止）
    pub fn fail_disconnect(&self, group_id: &str) {
        self.inner
            .faults
            .lock()
            .disconnect
            .insert(group_id.to_string());
    }

    /// 让指定主题创建失败
    pub fn fail_topic_creation(&self, topic: &str) {
        self.inner
            .faults
            .lock()
            .create_topic
            .insert(topic.to_string());
    }

    pub fn clear_faults(&self) {
        *self.inner.faults.lock() = FaultPlan::default();
    }
}

impl std::fmt::Debug for InMemoryKafka {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKafka")
            .field("topics", &self.topics())
            .field("stats", &self.stats())
            .finish()
    }
}

impl KafkaClient for InMemoryKafka {
    fn admin(&self) -> Box<dyn KafkaAdmin> {
        Box::new(InMemoryAdmin {
            broker: self.inner.clone(),
            connected: AtomicBool::new(false),
        })
    }

    fn consumer(&self, config: &ConsumerConfig) -> Box<dyn KafkaConsumer> {
        Box::new(InMemoryConsumer {
            broker: self.inner.clone(),
            group_id: config.group_id.clone(),
            member_id: Uuid::new_v4(),
            connected: AtomicBool::new(false),
            running: AtomicBool::new(false),
            subscription: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    fn producer(&self) -> Box<dyn KafkaProducer> {
        Box::new(InMemoryProducer {
            broker: self.clone(),
            connected: AtomicBool::new(false),
        })
    }
}

struct InMemoryAdmin {
    broker: Arc<BrokerInner>,
    connected: AtomicBool,
}

impl InMemoryAdmin {
    fn ensure_connected(&self) -> Result<(), BrokerError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::NotConnected)
        }
    }
}

#[async_trait]
impl KafkaAdmin for InMemoryAdmin {
    async fn connect(&self) -> Result<(), BrokerError> {
        self.broker.counters.admin_connects.fetch_add(1, Ordering::SeqCst);
        if self.broker.faults.lock().admin_connect {
            return Err(BrokerError::connection("broker 不可达"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn list_topics(&self) -> Result<Vec<String>, BrokerError> {
        self.ensure_connected()?;
        Ok(self.broker.state.lock().topics.keys().cloned().collect())
    }

    async fn create_topics(&self, topics: &[TopicSpec]) -> Result<bool, BrokerError> {
        self.ensure_connected()?;
        self.broker
            .counters
            .create_topic_calls
            .fetch_add(1, Ordering::SeqCst);

        {
            let faults = self.broker.faults.lock();
            if let Some(spec) = topics.iter().find(|spec| faults.create_topic.contains(&spec.topic)) {
                return Err(BrokerError::protocol(
                    "create_topics",
                    format!("创建主题被拒绝: {}", spec.topic),
                ));
            }
        }

        if let Some(spec) = topics
            .iter()
            .find(|spec| spec.num_partitions < 1 || spec.replication_factor < 1)
        {
            return Err(BrokerError::protocol(
                "create_topics",
                format!("无效的分区或副本数: {}", spec.topic),
            ));
        }

        let mut state = self.broker.state.lock();
        let mut created = false;
        for spec in topics {
            if !state.topics.contains_key(&spec.topic) {
                state
                    .topics
                    .insert(spec.topic.clone(), TopicLog::new(spec.num_partitions));
                created = true;
            }
        }
        Ok(created)
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        self.broker
            .counters
            .admin_disconnects
            .fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

struct InMemoryConsumer {
    broker: Arc<BrokerInner>,
    group_id: String,
    member_id: Uuid,
    connected: AtomicBool,
    running: AtomicBool,
    subscription: Mutex<Option<Subscription>>,
    cancel: CancellationToken,
}

impl InMemoryConsumer {
    fn ensure_connected(&self) -> Result<(), BrokerError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::NotConnected)
        }
    }
}

#[async_trait]
impl KafkaConsumer for InMemoryConsumer {
    async fn connect(&self) -> Result<(), BrokerError> {
        self.broker
            .counters
            .consumer_connects
            .fetch_add(1, Ordering::SeqCst);
        if self.broker.faults.lock().consumer_connect.contains(&self.group_id) {
            return Err(BrokerError::connection(format!(
                "消费者组 {} 无法连接",
                self.group_id
            )));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&self, subscription: &ConsumerSubscribeTopics) -> Result<(), BrokerError> {
        self.ensure_connected()?;
        if self.broker.faults.lock().subscribe.contains(&self.group_id) {
            return Err(BrokerError::protocol(
                "subscribe",
                format!("消费者组 {} 订阅被拒绝", self.group_id),
            ));
        }

        let matchers = subscription
            .topics
            .iter()
            .map(TopicMatcher::compile)
            .collect::<Result<Vec<_>, _>>()?;
        *self.subscription.lock() = Some(Subscription {
            matchers,
            from_beginning: subscription.from_beginning,
        });
        Ok(())
    }

    async fn run(&self, handler: EachMessageHandler) -> Result<(), BrokerError> {
        self.ensure_connected()?;
        let subscription = self
            .subscription
            .lock()
            .clone()
            .ok_or_else(|| BrokerError::protocol("run", "消费者尚未订阅"))?;
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(BrokerError::protocol("run", "消费循环已在运行"));
        }

        let (sender, mut receiver) = mpsc::unbounded_channel();
        {
            let mut state = self.broker.state.lock();
            if subscription.from_beginning {
                for (topic, log) in &state.topics {
                    if subscription.matches(topic) {
                        for message in &log.messages {
                            let _ = sender.send(message.clone());
                        }
                    }
                }
            }
            state.members.push(GroupMember {
                member_id: self.member_id,
                group_id: self.group_id.clone(),
                subscription,
                sender,
            });
        }

        let cancel = self.cancel.clone();
        let group_id = self.group_id.clone();
        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    message = receiver.recv() => match message {
                        Some(message) => message,
                        None => break,
                    },
                };
                handler(message).await;
            }
            debug!(group_id = %group_id, "内存消费循环已退出");
        });

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        self.cancel.cancel();
        self.broker
            .state
            .lock()
            .members
            .retain(|member| member.member_id != self.member_id);
        self.broker
            .counters
            .consumer_disconnects
            .fetch_add(1, Ordering::SeqCst);

        if self.broker.faults.lock().disconnect.contains(&self.group_id) {
            return Err(BrokerError::connection(format!(
                "消费者组 {} 离组失败",
                self.group_id
            )));
        }
        Ok(())
    }

    fn group_id(&self) -> &str {
        &self.group_id
    }
}

struct InMemoryProducer {
    broker: InMemoryKafka,
    connected: AtomicBool,
}

#[async_trait]
impl KafkaProducer for InMemoryProducer {
    async fn connect(&self) -> Result<(), BrokerError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, record: &ProducerRecord) -> Result<Vec<RecordMetadata>, BrokerError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrokerError::NotConnected);
        }
        record
            .messages
            .iter()
            .map(|message| self.broker.publish(&record.topic, message.clone()))
            .collect()
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
