//! # 示例应用程序
//!
//! 演示声明式 Kafka 消费者：两个处理器注册到组合根，启动后自动预置主题、
//! 绑定消费者组，然后通过生产者发送示例消息。

mod processors;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use infrastructure_common::HealthStatus;
use infrastructure_composition::{LoggingConfig, MessagingInfrastructure};
use messaging_abstractions::KafkaConfig;
use messaging_kafka::InMemoryKafka;
use processors::{AuditProcessor, OrderCreated, OrderProcessor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// broker 后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// 进程内 broker
    Memory,
    /// 真实 Kafka 集群（需要 rdkafka 特性）
    Rdkafka,
}

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "example-app")]
#[command(about = "Lorn ADSP 声明式 Kafka 消费者示例")]
struct Args {
    /// 配置文件路径（toml / json / yaml）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 环境变量前缀，例如 ADSP__KAFKA__BROKERS
    #[arg(long, default_value = "ADSP")]
    env_prefix: String,

    /// broker 后端
    #[arg(long, value_enum, default_value_t = Backend::Memory)]
    backend: Backend,

    /// 发送的示例订单数量
    #[arg(short = 'n', long, default_value_t = 5)]
    orders: u64,

    /// 每隔多少个订单发送一个会被拒绝的订单，0 表示不发送
    #[arg(long, default_value_t = 3)]
    reject_every: u64,

    /// 运行秒数，0 表示等待 Ctrl+C
    #[arg(long, default_value_t = 1)]
    run_for: u64,

    /// 日志级别
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 使用 JSON 日志
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let orders = Arc::new(OrderProcessor::default());
    let audit = Arc::new(AuditProcessor::default());
    let infrastructure = build_infrastructure(&args, orders.clone(), audit.clone()).await?;

    let report = infrastructure.start().await.context("启动消息基础设施失败")?;
    info!(
        handlers = report.handlers,
        sessions = report.sessions,
        topics = report.topics_ensured,
        "消费者已就绪"
    );

    publish_demo_events(&infrastructure, &args).await?;

    if args.run_for == 0 {
        info!("按 Ctrl+C 退出");
        tokio::signal::ctrl_c().await?;
        info!("收到退出信号，正在关闭应用");
    } else {
        tokio::time::sleep(Duration::from_secs(args.run_for)).await;
    }

    report_health(&infrastructure).await;
    info!(
        accepted = orders.accepted(),
        revenue_cents = orders.revenue_cents(),
        audit_topics = ?audit.seen_topics(),
        "处理结果"
    );

    let shutdown = infrastructure.stop().await?;
    if !shutdown.is_clean() {
        warn!(failures = ?shutdown.failures, "部分消费者未能正常断开");
    }

    info!("应用已关闭");
    Ok(())
}

/// 构建基础设施
async fn build_infrastructure(
    args: &Args,
    orders: Arc<OrderProcessor>,
    audit: Arc<AuditProcessor>,
) -> anyhow::Result<MessagingInfrastructure> {
    let logging = LoggingConfig {
        level: parse_log_level(&args.log_level),
        json_format: args.json_logs,
        ..LoggingConfig::default()
    };

    let mut builder = MessagingInfrastructure::builder().with_logging(logging);

    match &args.config {
        Some(path) => builder = builder.add_config_file_auto(path)?,
        None => {
            builder = builder.with_kafka_config(KafkaConfig::new(
                "example-app",
                vec!["localhost:9092".to_string()],
            ))
        }
    }
    builder = builder.add_config_env_vars(args.env_prefix.as_str());

    builder = match args.backend {
        Backend::Memory => builder.with_client(Arc::new(InMemoryKafka::new())),
        Backend::Rdkafka if cfg!(feature = "rdkafka") => builder,
        Backend::Rdkafka => bail!("rdkafka 后端需要使用 --features rdkafka 编译"),
    };

    let infrastructure = builder
        .register_processor(orders)?
        .register_processor(audit)?
        .build()
        .await?;
    Ok(infrastructure)
}

/// 发送示例订单和审计事件
async fn publish_demo_events(
    infrastructure: &MessagingInfrastructure,
    args: &Args,
) -> anyhow::Result<()> {
    let producer = infrastructure.producer();

    for id in 1..=args.orders {
        let rejected = args.reject_every > 0 && id % args.reject_every == 0;
        let order = OrderCreated {
            id,
            amount_cents: if rejected { 0 } else { id * 1250 },
        };
        let metadata = producer
            .send_json("orders", Some(&id.to_string()), &order)
            .await?;
        info!(order_id = id, offset = metadata.offset, "订单已发送");
    }

    producer
        .send_json("audit.login", None, &serde_json::json!({"user": "alice"}))
        .await?;
    producer
        .send_json("audit.payment", None, &serde_json::json!({"order": 1}))
        .await?;
    Ok(())
}

/// 输出健康检查结果
async fn report_health(infrastructure: &MessagingInfrastructure) {
    for (component_name, status) in infrastructure.check_health().await {
        match status {
            HealthStatus::Healthy => info!("组件 {} 健康", component_name),
            HealthStatus::Degraded { message, .. } => {
                warn!("组件 {} 降级: {}", component_name, message)
            }
            HealthStatus::Unhealthy { error, .. } => {
                error!("组件 {} 不健康: {}", component_name, error)
            }
        }
    }
}

/// 解析日志级别
fn parse_log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
