//! 声明式处理器 + 组合根 + 进程内 broker 的端到端测试

use component_macros::{kafka_processor, Component};
use infrastructure_composition::{InfrastructureError, InfrastructureStatus, MessagingInfrastructure};
use messaging_abstractions::{ConsumedMessage, KafkaConfig};
use messaging_kafka::InMemoryKafka;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Invoice {
    id: u64,
    #[serde(default)]
    explode: bool,
}

/// 记录收到的发票号，`id == 0` 返回错误，`explode` 触发 panic
#[derive(Debug, Default, Component)]
#[component(name = "invoice-processor", priority = 20)]
struct InvoiceProcessor {
    seen: Mutex<Vec<u64>>,
}

#[kafka_processor]
impl InvoiceProcessor {
    #[kafka_consumer(topics = ["invoices"], group_id = "invoicing")]
    async fn on_invoice(&self, invoice: Invoice) -> Result<(), String> {
        if invoice.explode {
            panic!("invoice {} exploded", invoice.id);
        }
        if invoice.id == 0 {
            return Err("invoice id must be positive".to_string());
        }
        self.seen.lock().unwrap().push(invoice.id);
        Ok(())
    }

    fn seen(&self) -> Vec<u64> {
        self.seen.lock().unwrap().clone()
    }
}

/// 与发票处理器订阅同一主题、不同消费者组
#[derive(Debug, Default, Component)]
#[component(name = "ledger-processor")]
struct LedgerProcessor {
    entries: Mutex<Vec<Value>>,
    replayed: Mutex<Vec<Value>>,
}

#[kafka_processor]
impl LedgerProcessor {
    #[kafka_consumer(topics = ["invoices", "credits"], group_id = "ledger")]
    async fn on_entry(&self, entry: Value) -> Result<(), String> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    #[kafka_consumer(topics = ["history"], group_id = "ledger-replay", from_beginning)]
    async fn on_history(&self, entry: Value) -> Result<(), String> {
        self.replayed.lock().unwrap().push(entry);
        Ok(())
    }

    fn entries(&self) -> Vec<Value> {
        self.entries.lock().unwrap().clone()
    }

    fn replayed(&self) -> Vec<Value> {
        self.replayed.lock().unwrap().clone()
    }
}

/// 模式订阅，不参与主题预置
#[derive(Debug, Default, Component)]
struct MetricsProcessor {
    topics: Mutex<Vec<String>>,
}

#[kafka_processor]
impl MetricsProcessor {
    #[kafka_consumer(patterns = ["^metrics\\..+$"], group_id = "metrics")]
    async fn on_metric(&self, _value: Value, message: ConsumedMessage) -> Result<(), String> {
        self.topics.lock().unwrap().push(message.topic);
        Ok(())
    }
}

/// 与发票处理器争用同一个 groupId
#[derive(Debug, Default, Component)]
struct RogueInvoiceProcessor;

#[kafka_processor]
impl RogueInvoiceProcessor {
    #[kafka_consumer(topics = ["invoices-v2"], group_id = "invoicing")]
    async fn on_invoice(&self, _value: Value) -> Result<(), String> {
        Ok(())
    }
}

/// 已禁用的处理器不会被发现
#[derive(Debug, Default, Component)]
#[component(disabled)]
struct ArchivedProcessor;

#[kafka_processor]
impl ArchivedProcessor {
    #[kafka_consumer(topics = ["archive"], group_id = "archive")]
    async fn on_archive(&self, _value: Value) -> Result<(), String> {
        Ok(())
    }
}

struct Harness {
    broker: InMemoryKafka,
    infrastructure: MessagingInfrastructure,
    invoices: Arc<InvoiceProcessor>,
    ledger: Arc<LedgerProcessor>,
    metrics: Arc<MetricsProcessor>,
}

async fn harness(broker: InMemoryKafka) -> Harness {
    let invoices = Arc::new(InvoiceProcessor::default());
    let ledger = Arc::new(LedgerProcessor::default());
    let metrics = Arc::new(MetricsProcessor::default());

    let infrastructure = MessagingInfrastructure::builder()
        .with_kafka_config(KafkaConfig::new("e2e", vec!["localhost:9092".to_string()]))
        .with_client(Arc::new(broker.clone()))
        .register_processor(invoices.clone())
        .unwrap()
        .register_processor(ledger.clone())
        .unwrap()
        .register_processor(metrics.clone())
        .unwrap()
        .register_processor(Arc::new(ArchivedProcessor))
        .unwrap()
        .build()
        .await
        .unwrap();

    Harness {
        broker,
        infrastructure,
        invoices,
        ledger,
        metrics,
    }
}

async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_bootstrap_provisions_exact_topics_only() {
    let h = harness(InMemoryKafka::new()).await;
    let report = h.infrastructure.start().await.unwrap();

    assert_eq!(report.processors, 3);
    assert_eq!(report.handlers, 4);
    assert_eq!(report.sessions, 4);
    assert!(report.is_complete());

    let mut topics = h.broker.topics();
    topics.sort();
    assert_eq!(topics, vec!["credits", "history", "invoices"]);
    assert_eq!(h.broker.partitions("invoices"), Some(1));
    assert_eq!(
        h.broker.active_groups(),
        vec!["invoicing", "ledger", "ledger-replay", "metrics"]
    );

    // 每个精确主题订阅各自连接一次管理端
    let stats = h.broker.stats();
    assert_eq!(stats.admin_connects, 4);
    assert_eq!(stats.admin_connects, stats.admin_disconnects);

    h.infrastructure.stop().await.unwrap();
}

#[tokio::test]
async fn test_each_group_receives_every_message() {
    let h = harness(InMemoryKafka::new()).await;
    h.infrastructure.start().await.unwrap();

    let producer = h.infrastructure.producer();
    producer.send_json("invoices", None, &json!({"id": 1})).await.unwrap();
    producer.send_json("credits", None, &json!({"id": 2})).await.unwrap();
    producer
        .send_json("metrics.cpu", None, &json!({"load": 0.5}))
        .await
        .unwrap();

    wait_for(|| h.ledger.entries().len() == 2).await;
    wait_for(|| h.invoices.seen() == vec![1]).await;
    wait_for(|| h.metrics.topics.lock().unwrap().len() == 1).await;
    assert_eq!(*h.metrics.topics.lock().unwrap(), vec!["metrics.cpu".to_string()]);

    h.infrastructure.stop().await.unwrap();
}

#[tokio::test]
async fn test_bad_messages_do_not_stop_the_session() {
    let h = harness(InMemoryKafka::new()).await;
    h.infrastructure.start().await.unwrap();

    let producer = h.infrastructure.producer();
    // 处理器返回错误
    producer.send_json("invoices", None, &json!({"id": 0})).await.unwrap();
    // 处理器 panic
    producer
        .send_json("invoices", None, &json!({"id": 5, "explode": true}))
        .await
        .unwrap();
    // 无法反序列化为 Invoice
    producer
        .send_json("invoices", None, &json!({"unexpected": "shape"}))
        .await
        .unwrap();
    // 非 JSON 消息体
    h.broker
        .publish(
            "invoices",
            messaging_abstractions::ProducerMessage::new(b"not json".to_vec()),
        )
        .unwrap();
    producer.send_json("invoices", None, &json!({"id": 9})).await.unwrap();

    wait_for(|| h.invoices.seen() == vec![9]).await;
    // 另一个消费者组收到除非 JSON 消息体以外的四条
    wait_for(|| h.ledger.entries().len() == 4).await;

    let sessions = h.infrastructure.explorer().sessions();
    assert!(sessions.iter().all(|session| session.is_running()));
    assert!(h.infrastructure.get_overall_health().await.is_healthy());

    h.infrastructure.stop().await.unwrap();
}

#[tokio::test]
async fn test_from_beginning_replays_existing_messages() {
    let broker = InMemoryKafka::new();
    broker.publish_json("history", &json!({"seq": 1})).unwrap();
    broker.publish_json("history", &json!({"seq": 2})).unwrap();
    broker.publish_json("invoices", &json!({"id": 77})).unwrap();

    let h = harness(broker).await;
    h.infrastructure.start().await.unwrap();

    wait_for(|| h.ledger.replayed().len() == 2).await;
    assert_eq!(h.ledger.replayed()[0], json!({"seq": 1}));

    // 未声明 from_beginning 的消费者组只处理启动后的消息
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.invoices.seen().is_empty());

    h.infrastructure.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_ends_delivery() {
    let h = harness(InMemoryKafka::new()).await;
    h.infrastructure.start().await.unwrap();

    h.broker.publish_json("invoices", &json!({"id": 3})).unwrap();
    wait_for(|| h.invoices.seen() == vec![3]).await;

    h.infrastructure.stop().await.unwrap();
    assert_eq!(h.infrastructure.get_status().await, InfrastructureStatus::Stopped);
    assert!(h.broker.active_groups().is_empty());
    assert_eq!(h.broker.stats().consumer_disconnects, 4);

    h.broker.publish_json("invoices", &json!({"id": 4})).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.invoices.seen(), vec![3]);
}

#[tokio::test]
async fn test_duplicate_group_across_processors_aborts_startup() {
    let broker = InMemoryKafka::new();
    let infrastructure = MessagingInfrastructure::builder()
        .with_kafka_config(KafkaConfig::new("e2e", vec!["localhost:9092".to_string()]))
        .with_client(Arc::new(broker.clone()))
        .register_processor(Arc::new(InvoiceProcessor::default()))
        .unwrap()
        .register_processor(Arc::new(RogueInvoiceProcessor))
        .unwrap()
        .build()
        .await
        .unwrap();

    let error = infrastructure.start().await.unwrap_err();
    assert!(matches!(error, InfrastructureError::Messaging { .. }));
    assert!(error.to_string().contains("invoicing"));

    assert!(broker.topics().is_empty());
    assert_eq!(broker.stats().admin_connects, 0);
    assert_eq!(broker.stats().consumer_connects, 0);
}

#[tokio::test]
async fn test_partial_bind_failure_degrades_health() {
    let broker = InMemoryKafka::new();
    broker.fail_subscribe("metrics");
    let h = harness(broker).await;

    let report = h.infrastructure.start().await.unwrap();
    assert_eq!(report.sessions, 3);
    assert_eq!(report.bind_failures.len(), 1);
    assert!(h.infrastructure.get_overall_health().await.is_degraded());

    // 其他消费者不受影响
    h.broker.publish_json("invoices", &json!({"id": 11})).unwrap();
    wait_for(|| h.invoices.seen() == vec![11]).await;

    h.infrastructure.stop().await.unwrap();
}
