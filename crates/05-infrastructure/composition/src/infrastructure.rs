//! 消息基础设施主入口

use crate::builder::MessagingInfrastructureBuilder;
use di_abstractions::ComponentRegistry;
use di_impl::DiContainerImpl;
use infrastructure_common::{Component, HealthCheckable, HealthStatus, InfrastructureError};
use messaging_abstractions::{KafkaConfig, MessagingError};
use messaging_kafka::{BootstrapReport, KafkaExplorer, KafkaProducerService, ShutdownReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// 单个健康检查的超时时间
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// 消息基础设施
///
/// 持有组件容器、消费者编排器和生产者服务，负责它们的启动与关闭顺序
pub struct MessagingInfrastructure {
    /// 生效的 Kafka 配置
    kafka_config: KafkaConfig,
    /// 组件容器
    container: Arc<DiContainerImpl>,
    /// 消费者编排器
    explorer: Arc<KafkaExplorer>,
    /// 生产者服务
    producer: Arc<KafkaProducerService>,
    /// 额外的健康检查器
    health_checkers: Vec<Box<dyn HealthCheckable>>,
    /// 运行状态
    status: Arc<RwLock<InfrastructureStatus>>,
    /// 统计信息
    metrics: Arc<RwLock<InfrastructureMetrics>>,
}

impl MessagingInfrastructure {
    /// 创建基础设施构建器
    pub fn builder() -> MessagingInfrastructureBuilder {
        MessagingInfrastructureBuilder::new()
    }

    pub(crate) fn new(
        kafka_config: KafkaConfig,
        container: Arc<DiContainerImpl>,
        explorer: Arc<KafkaExplorer>,
        producer: Arc<KafkaProducerService>,
        health_checkers: Vec<Box<dyn HealthCheckable>>,
    ) -> Self {
        Self {
            kafka_config,
            container,
            explorer,
            producer,
            health_checkers,
            status: Arc::new(RwLock::new(InfrastructureStatus::Initialized)),
            metrics: Arc::new(RwLock::new(InfrastructureMetrics::default())),
        }
    }

    /// 启动基础设施：先连接生产者，再发现并启动消费者
    ///
    /// 重复调用返回首次启动的报告；关闭后不能再次启动
    pub async fn start(&self) -> Result<BootstrapReport, InfrastructureError> {
        {
            let mut status = self.status.write().await;
            match *status {
                InfrastructureStatus::Running => {
                    return Ok(self.explorer.last_report().unwrap_or_default());
                }
                InfrastructureStatus::Stopping | InfrastructureStatus::Stopped => {
                    return Err(InfrastructureError::BootstrapFailed {
                        message: "基础设施已停止，不能再次启动".to_string(),
                    });
                }
                _ => *status = InfrastructureStatus::Starting,
            }
        }

        info!(client_id = %self.kafka_config.client_id, "启动消息基础设施");

        if let Err(e) = self.producer.connect().await {
            error!(error = %e, "生产者连接失败");
            self.set_status(InfrastructureStatus::Failed).await;
            return Err(messaging_error(e));
        }

        let report = match self.explorer.explore().await {
            Ok(report) => report,
            Err(e) => {
                if e.is_configuration_conflict() {
                    error!(error = %e, "Kafka 消费者配置冲突，启动中止");
                } else {
                    error!(error = %e, "Kafka 消费者启动失败");
                }
                if let Err(disconnect_error) = self.producer.disconnect().await {
                    warn!(error = %disconnect_error, "回滚时断开生产者失败");
                }
                self.set_status(InfrastructureStatus::Failed).await;
                return Err(messaging_error(e));
            }
        };

        {
            let mut metrics = self.metrics.write().await;
            metrics.start_time = Some(chrono::Utc::now());
            metrics.registered_components_count = report.components;
            metrics.consumer_handlers_count = report.handlers;
            metrics.running_sessions_count = report.sessions;
        }
        self.set_status(InfrastructureStatus::Running).await;

        info!(
            handlers = report.handlers,
            sessions = report.sessions,
            "消息基础设施启动完成"
        );
        Ok(report)
    }

    /// 停止基础设施：先断开全部消费者，再断开生产者
    ///
    /// 已停止时直接返回空报告
    pub async fn stop(&self) -> Result<ShutdownReport, InfrastructureError> {
        {
            let mut status = self.status.write().await;
            if matches!(
                *status,
                InfrastructureStatus::Stopping | InfrastructureStatus::Stopped
            ) {
                return Ok(ShutdownReport::default());
            }
            *status = InfrastructureStatus::Stopping;
        }

        info!("停止消息基础设施");

        let report = self.explorer.shutdown().await;
        let producer_result = self.producer.disconnect().await;

        {
            let mut metrics = self.metrics.write().await;
            metrics.stop_time = Some(chrono::Utc::now());
            metrics.running_sessions_count = 0;
        }
        self.set_status(InfrastructureStatus::Stopped).await;

        if let Err(e) = producer_result {
            error!(error = %e, "生产者断开失败");
            return Err(InfrastructureError::ShutdownFailed {
                message: e.to_string(),
            });
        }
        if !report.is_clean() {
            warn!(failures = report.failures.len(), "部分消费者断开失败");
        }

        info!(
            disconnected = report.disconnected.len(),
            "消息基础设施停止完成"
        );
        Ok(report)
    }

    async fn set_status(&self, status: InfrastructureStatus) {
        *self.status.write().await = status;
    }

    /// 执行健康检查
    pub async fn check_health(&self) -> Vec<(String, HealthStatus)> {
        let mut results = Vec::with_capacity(self.health_checkers.len() + 2);

        results.push((
            self.explorer.name().to_string(),
            with_timeout(self.explorer.check_health()).await,
        ));
        results.push(("kafka-producer".to_string(), self.producer_health().await));

        for checker in &self.health_checkers {
            let status = with_timeout(checker.check_health()).await;
            results.push((checker.name().to_string(), status));
        }

        self.metrics.write().await.health_check_count += 1;
        results
    }

    async fn producer_health(&self) -> HealthStatus {
        match (self.get_status().await, self.producer.is_connected()) {
            (InfrastructureStatus::Running, false) => HealthStatus::unhealthy("生产者未连接"),
            _ => HealthStatus::healthy(),
        }
    }

    /// 获取整体健康状态
    pub async fn get_overall_health(&self) -> HealthStatus {
        let results = self.check_health().await;

        let unhealthy_count = results
            .iter()
            .filter(|(_, status)| status.is_unhealthy())
            .count();
        let degraded_count = results
            .iter()
            .filter(|(_, status)| status.is_degraded())
            .count();

        if unhealthy_count > 0 {
            HealthStatus::unhealthy(format!("{}个组件不健康", unhealthy_count))
        } else if degraded_count > 0 {
            HealthStatus::degraded(format!("{}个组件降级", degraded_count))
        } else {
            HealthStatus::healthy()
        }
    }

    /// 解析已注册的组件
    pub fn resolve<T: Component>(&self) -> Result<Arc<T>, InfrastructureError> {
        self.container.resolve::<T>().map_err(Into::into)
    }

    /// 已注册并启用的组件名称，按枚举顺序
    pub fn component_names(&self) -> Vec<String> {
        self.container
            .get_instances()
            .into_iter()
            .map(|component| component.name)
            .collect()
    }

    /// 获取运行状态
    pub async fn get_status(&self) -> InfrastructureStatus {
        *self.status.read().await
    }

    /// 获取统计信息
    pub async fn get_metrics(&self) -> InfrastructureMetrics {
        self.metrics.read().await.clone()
    }

    pub fn kafka_config(&self) -> &KafkaConfig {
        &self.kafka_config
    }

    pub fn explorer(&self) -> &Arc<KafkaExplorer> {
        &self.explorer
    }

    pub fn producer(&self) -> &Arc<KafkaProducerService> {
        &self.producer
    }
}

impl std::fmt::Debug for MessagingInfrastructure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingInfrastructure")
            .field("client_id", &self.kafka_config.client_id)
            .field("explorer", &self.explorer)
            .field("producer", &self.producer)
            .field("health_checkers", &self.health_checkers.len())
            .finish()
    }
}

fn messaging_error(error: MessagingError) -> InfrastructureError {
    InfrastructureError::Messaging {
        source: Box::new(error),
    }
}

async fn with_timeout(check: impl std::future::Future<Output = HealthStatus>) -> HealthStatus {
    tokio::time::timeout(HEALTH_CHECK_TIMEOUT, check)
        .await
        .unwrap_or_else(|_| HealthStatus::unhealthy("健康检查超时"))
}

/// 基础设施运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfrastructureStatus {
    /// 已构建，尚未启动
    Initialized,
    /// 启动中
    Starting,
    /// 运行中
    Running,
    /// 停止中
    Stopping,
    /// 已停止
    Stopped,
    /// 启动失败
    Failed,
}

/// 基础设施统计信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfrastructureMetrics {
    /// 启动时间
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    /// 停止时间
    pub stop_time: Option<chrono::DateTime<chrono::Utc>>,
    /// 启动时枚举到的组件数量
    pub registered_components_count: usize,
    /// 发现的消息处理方法数量
    pub consumer_handlers_count: usize,
    /// 运行中的消费者会话数量
    pub running_sessions_count: usize,
    /// 健康检查执行次数
    pub health_check_count: u64,
}

impl InfrastructureMetrics {
    /// 计算运行时间
    pub fn uptime(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.stop_time) {
            (Some(start), Some(stop)) => Some(stop - start),
            (Some(start), None) => Some(chrono::Utc::now() - start),
            _ => None,
        }
    }
}
