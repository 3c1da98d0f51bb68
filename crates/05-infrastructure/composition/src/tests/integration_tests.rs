//! 消息基础设施构建与生命周期测试

use crate::{InfrastructureError, InfrastructureStatus, MessagingInfrastructure};
use component_macros::{kafka_processor, Component};
use messaging_abstractions::KafkaConfig;
use messaging_kafka::InMemoryKafka;
use serde::Deserialize;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Payment {
    amount: u64,
}

#[derive(Debug, Default, Component)]
#[component(name = "payment-processor", priority = 5)]
struct PaymentProcessor {
    total: AtomicU64,
}

#[kafka_processor]
impl PaymentProcessor {
    #[kafka_consumer(topics = ["payments"], group_id = "payment-service")]
    async fn on_payment(&self, payment: Payment) -> Result<(), String> {
        self.total.fetch_add(payment.amount, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default, Component)]
#[component(name = "refund-processor")]
struct RefundProcessor;

#[kafka_processor]
impl RefundProcessor {
    #[kafka_consumer(topics = ["refunds"], group_id = "refund-service")]
    async fn on_refund(&self, _refund: serde_json::Value) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Default, Component)]
#[component(name = "shadow-payments")]
struct ShadowPaymentProcessor;

#[kafka_processor]
impl ShadowPaymentProcessor {
    #[kafka_consumer(topics = ["payments"], group_id = "payment-service")]
    async fn on_payment(&self, _payment: serde_json::Value) -> Result<(), String> {
        Ok(())
    }
}

fn local_config() -> KafkaConfig {
    KafkaConfig::new("composition-test", vec!["localhost:9092".to_string()])
}

async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_start_delivers_messages_and_stop_disconnects() {
    let broker = InMemoryKafka::new();
    let processor = Arc::new(PaymentProcessor::default());

    let infrastructure = MessagingInfrastructure::builder()
        .with_kafka_config(local_config())
        .with_client(Arc::new(broker.clone()))
        .register_processor(processor.clone())
        .unwrap()
        .register_processor(Arc::new(RefundProcessor))
        .unwrap()
        .build()
        .await
        .unwrap();
    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Initialized);

    let report = infrastructure.start().await.unwrap();
    assert_eq!(report.handlers, 2);
    assert_eq!(report.sessions, 2);
    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Running);
    assert!(infrastructure.producer().is_connected());

    infrastructure
        .producer()
        .send_json("payments", Some("p-1"), &serde_json::json!({"amount": 30}))
        .await
        .unwrap();
    wait_for(|| processor.total.load(Ordering::SeqCst) == 30).await;

    let shutdown = infrastructure.stop().await.unwrap();
    assert_eq!(shutdown.disconnected.len(), 2);
    assert!(broker.active_groups().is_empty());
    assert!(!infrastructure.producer().is_connected());
    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Stopped);

    let metrics = infrastructure.get_metrics().await;
    assert_eq!(metrics.consumer_handlers_count, 2);
    assert!(metrics.uptime().is_some());
}

#[tokio::test]
async fn test_start_twice_returns_first_report() {
    let broker = InMemoryKafka::new();
    let infrastructure = MessagingInfrastructure::builder()
        .with_kafka_config(local_config())
        .with_client(Arc::new(broker.clone()))
        .register_processor(Arc::new(RefundProcessor))
        .unwrap()
        .build()
        .await
        .unwrap();

    let first = infrastructure.start().await.unwrap();
    let second = infrastructure.start().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(broker.stats().consumer_connects, 1);

    infrastructure.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_is_idempotent_and_blocks_restart() {
    let infrastructure = MessagingInfrastructure::builder()
        .with_kafka_config(local_config())
        .with_client(Arc::new(InMemoryKafka::new()))
        .build()
        .await
        .unwrap();

    infrastructure.start().await.unwrap();
    infrastructure.stop().await.unwrap();

    let second = infrastructure.stop().await.unwrap();
    assert!(second.disconnected.is_empty());
    assert!(second.is_clean());

    assert!(matches!(
        infrastructure.start().await,
        Err(InfrastructureError::BootstrapFailed { .. })
    ));
}

#[tokio::test]
async fn test_duplicate_group_fails_start_and_rolls_back_producer() {
    let broker = InMemoryKafka::new();
    let infrastructure = MessagingInfrastructure::builder()
        .with_kafka_config(local_config())
        .with_client(Arc::new(broker.clone()))
        .register_processor(Arc::new(PaymentProcessor::default()))
        .unwrap()
        .register_processor(Arc::new(ShadowPaymentProcessor))
        .unwrap()
        .build()
        .await
        .unwrap();

    let error = infrastructure.start().await.unwrap_err();
    assert!(matches!(error, InfrastructureError::Messaging { .. }));
    assert!(error.to_string().contains("payment-service"));
    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Failed);
    assert!(!infrastructure.producer().is_connected());
    assert_eq!(broker.stats().admin_connects, 0);
    assert_eq!(broker.stats().consumer_connects, 0);
}

#[tokio::test]
async fn test_health_reflects_bind_failures() {
    let broker = InMemoryKafka::new();
    broker.fail_consumer_connect("refund-service");

    let infrastructure = MessagingInfrastructure::builder()
        .with_kafka_config(local_config())
        .with_client(Arc::new(broker.clone()))
        .register_processor(Arc::new(PaymentProcessor::default()))
        .unwrap()
        .register_processor(Arc::new(RefundProcessor))
        .unwrap()
        .build()
        .await
        .unwrap();

    assert!(infrastructure.get_overall_health().await.is_healthy());

    let report = infrastructure.start().await.unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.sessions, 1);

    let health = infrastructure.get_overall_health().await;
    assert!(health.is_degraded());

    let checks = infrastructure.check_health().await;
    assert!(checks.iter().any(|(name, _)| name == "kafka-explorer"));
    assert!(checks.iter().any(|(name, _)| name == "kafka-producer"));
    assert_eq!(infrastructure.get_metrics().await.health_check_count, 3);

    infrastructure.stop().await.unwrap();
}

#[tokio::test]
async fn test_components_resolve_in_priority_order() {
    let infrastructure = MessagingInfrastructure::builder()
        .with_kafka_config(local_config())
        .with_client(Arc::new(InMemoryKafka::new()))
        .register_processor(Arc::new(RefundProcessor))
        .unwrap()
        .register_processor(Arc::new(PaymentProcessor::default()))
        .unwrap()
        .build()
        .await
        .unwrap();

    assert_eq!(
        infrastructure.component_names(),
        vec!["payment-processor".to_string(), "refund-processor".to_string()]
    );
    assert!(infrastructure.resolve::<PaymentProcessor>().is_ok());
    assert!(matches!(
        infrastructure.resolve::<ShadowPaymentProcessor>(),
        Err(InfrastructureError::DependencyError { .. })
    ));
}

#[tokio::test]
async fn test_build_reads_config_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "[kafka]\nclient_id = \"from-file\"\nbrokers = [\"broker-1:9092\"]"
    )
    .unwrap();

    let infrastructure = MessagingInfrastructure::builder()
        .add_config_toml(file.path())
        .unwrap()
        .with_client(Arc::new(InMemoryKafka::new()))
        .build()
        .await
        .unwrap();

    assert_eq!(infrastructure.kafka_config().client_id, "from-file");
    assert_eq!(infrastructure.kafka_config().brokers, vec!["broker-1:9092".to_string()]);
}

#[tokio::test]
async fn test_invalid_config_is_rejected_unless_validation_disabled() {
    let result = MessagingInfrastructure::builder()
        .with_client(Arc::new(InMemoryKafka::new()))
        .build()
        .await;
    assert!(matches!(result, Err(InfrastructureError::ConfigError { .. })));

    let infrastructure = MessagingInfrastructure::builder()
        .with_client(Arc::new(InMemoryKafka::new()))
        .enable_validation(false)
        .build()
        .await
        .unwrap();
    assert!(infrastructure.kafka_config().brokers.is_empty());
}

#[tokio::test]
async fn test_missing_config_file_is_reported() {
    let result = MessagingInfrastructure::builder().add_config_json("/missing/app.json");
    assert!(matches!(result, Err(InfrastructureError::ConfigError { .. })));
}

#[cfg(not(feature = "rdkafka"))]
#[tokio::test]
async fn test_build_without_client_fails() {
    let result = MessagingInfrastructure::builder()
        .with_kafka_config(local_config())
        .build()
        .await;
    assert!(matches!(result, Err(InfrastructureError::BootstrapFailed { .. })));
}
