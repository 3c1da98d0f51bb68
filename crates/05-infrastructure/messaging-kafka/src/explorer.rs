//! Kafka 消费者编排器
//!
//! 启动时扫描组件注册表，找出所有处理器上声明的消费者方法，
//! 先并发确保所有订阅主题存在，再并发为每个方法绑定独立的消费者会话；
//! 关闭时并发断开全部会话。

use crate::accessor::KafkaMetadataAccessor;
use crate::binder::ConsumerBinder;
use crate::descriptor::HandlerDescriptor;
use crate::group_registry::GroupIdRegistry;
use crate::provisioner::TopicProvisioner;
use crate::session::{ConsumerSession, SessionSet};
use async_trait::async_trait;
use di_abstractions::{ComponentInstance, ComponentRegistry};
use futures::future::join_all;
use infrastructure_common::{HealthCheckable, HealthStatus, Lifecycle, LifecycleState};
use messaging_abstractions::{HandlerLocation, KafkaClient, MessagingError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 一次启动的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// 注册表中的组件数
    pub components: usize,
    /// 处理器组件数
    pub processors: usize,
    /// 发现的处理方法数
    pub handlers: usize,
    /// 成功确保存在的主题次数
    pub topics_ensured: usize,
    /// 确保存在失败的主题
    pub provisioning_failures: Vec<String>,
    /// 成功启动的会话数
    pub sessions: usize,
    /// 绑定失败的处理方法
    pub bind_failures: Vec<HandlerLocation>,
}

impl BootstrapReport {
    /// 是否所有步骤都成功
    pub fn is_complete(&self) -> bool {
        self.provisioning_failures.is_empty() && self.bind_failures.is_empty()
    }
}

/// 一次关闭的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// 成功断开的 groupId
    pub disconnected: Vec<String>,
    /// 断开失败的 groupId 与原因
    pub failures: Vec<(String, String)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Kafka 消费者编排器
pub struct KafkaExplorer {
    registry: Arc<dyn ComponentRegistry>,
    accessor: Arc<KafkaMetadataAccessor>,
    groups: GroupIdRegistry,
    provisioner: TopicProvisioner,
    binder: ConsumerBinder,
    sessions: Arc<SessionSet>,
    initialized: AtomicBool,
    bootstrap_lock: tokio::sync::Mutex<()>,
    state: RwLock<LifecycleState>,
    last_report: RwLock<Option<BootstrapReport>>,
}

impl KafkaExplorer {
    pub fn new(
        registry: Arc<dyn ComponentRegistry>,
        accessor: Arc<KafkaMetadataAccessor>,
        client: Arc<dyn KafkaClient>,
    ) -> Self {
        let sessions = Arc::new(SessionSet::new());
        Self {
            registry,
            accessor,
            groups: GroupIdRegistry::new(),
            provisioner: TopicProvisioner::new(client.clone()),
            binder: ConsumerBinder::new(client, sessions.clone()),
            sessions,
            initialized: AtomicBool::new(false),
            bootstrap_lock: tokio::sync::Mutex::new(()),
            state: RwLock::new(LifecycleState::Uninitialized),
            last_report: RwLock::new(None),
        }
    }

    /// 发现并启动所有消费者，每个编排器只会真正执行一次
    ///
    /// groupId 冲突在任何 I/O 之前中止启动；主题预置和绑定失败只记录日志
    pub async fn explore(&self) -> Result<BootstrapReport, MessagingError> {
        let _guard = self.bootstrap_lock.lock().await;

        if self.initialized.load(Ordering::SeqCst) {
            debug!("Kafka 消费者已初始化，跳过");
            return Ok(self.last_report().unwrap_or_default());
        }
        if matches!(self.state(), LifecycleState::Stopping | LifecycleState::Stopped) {
            warn!("Kafka 编排器已关闭，不再启动消费者");
            return Ok(BootstrapReport::default());
        }

        let components = self.registry.get_instances();
        if components.is_empty() {
            warn!("组件注册表为空，未发现任何 Kafka 处理器");
            return Ok(BootstrapReport::default());
        }

        self.set_state(LifecycleState::Initializing);
        info!("开始发现 Kafka 消费者");

        let mut report = BootstrapReport {
            components: components.len(),
            ..BootstrapReport::default()
        };

        let descriptors = match self.discover(components, &mut report) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                self.set_state(LifecycleState::Error);
                return Err(e);
            }
        };
        report.handlers = descriptors.len();

        self.provision(&descriptors, &mut report).await;
        self.bind_all(&descriptors, &mut report).await;

        self.initialized.store(true, Ordering::SeqCst);
        self.set_state(LifecycleState::Running);
        *self.last_report.write() = Some(report.clone());

        info!(
            processors = report.processors,
            handlers = report.handlers,
            sessions = report.sessions,
            provisioning_failures = report.provisioning_failures.len(),
            bind_failures = report.bind_failures.len(),
            "Kafka 消费者启动完成"
        );
        Ok(report)
    }

    fn discover(
        &self,
        components: Vec<ComponentInstance>,
        report: &mut BootstrapReport,
    ) -> Result<Vec<Arc<HandlerDescriptor>>, MessagingError> {
        let processors: Vec<ComponentInstance> = components
            .into_iter()
            .filter(|component| self.accessor.is_processor(component.instance_type_id()))
            .collect();
        report.processors = processors.len();
        debug!(processors = processors.len(), "发现 Kafka 处理器");

        let mut descriptors = Vec::new();
        let mut claimed: Vec<String> = Vec::new();
        for component in &processors {
            let Some(type_id) = component.instance_type_id() else {
                continue;
            };

            for method in &component.method_names {
                let Some(options) = self.accessor.get_consumer_options(type_id, method) else {
                    continue;
                };

                let location = HandlerLocation::new(
                    component.type_info.module_path.clone(),
                    component.name.clone(),
                    *method,
                );

                let Some(invoke) = self.accessor.bind_handler(component, method) else {
                    warn!(handler = %location, "无法绑定处理方法，已跳过");
                    continue;
                };

                if let Err(e) = self.groups.register_or_reject(options.group_id(), &location) {
                    self.release_groups(&claimed);
                    return Err(e);
                }
                claimed.push(options.group_id().to_string());

                debug!(handler = %location, group_id = %options.group_id(), "发现 Kafka 消费者");
                descriptors.push(Arc::new(HandlerDescriptor::new(location, options, invoke)));
            }
        }

        Ok(descriptors)
    }

    /// 启动中止时撤销本轮已登记的 groupId
    fn release_groups(&self, group_ids: &[String]) {
        for group_id in group_ids {
            self.groups.release(group_id);
        }
        if !group_ids.is_empty() {
            debug!(groups = group_ids.len(), "已撤销本轮登记的 groupId");
        }
    }

    async fn provision(&self, descriptors: &[Arc<HandlerDescriptor>], report: &mut BootstrapReport) {
        let requests: Vec<(HandlerLocation, String)> = descriptors
            .iter()
            .flat_map(|descriptor| {
                descriptor
                    .topic_names()
                    .into_iter()
                    .map(move |topic| (descriptor.location.clone(), topic.to_string()))
            })
            .collect();

        let results = join_all(requests.iter().map(|(location, topic)| async move {
            let result = self.provisioner.ensure_topic(topic).await;
            if let Err(e) = &result {
                error!(handler = %location, error = %e, "预置订阅主题失败，仍将尝试绑定消费者");
            }
            result
        }))
        .await;

        for ((_, topic), result) in requests.into_iter().zip(results) {
            match result {
                Ok(_) => report.topics_ensured += 1,
                Err(_) => report.provisioning_failures.push(topic),
            }
        }
    }

    async fn bind_all(&self, descriptors: &[Arc<HandlerDescriptor>], report: &mut BootstrapReport) {
        let results = join_all(
            descriptors
                .iter()
                .map(|descriptor| self.binder.bind(descriptor.clone())),
        )
        .await;

        for (descriptor, result) in descriptors.iter().zip(results) {
            match result {
                Ok(_) => report.sessions += 1,
                Err(_) => report.bind_failures.push(descriptor.location.clone()),
            }
        }
    }

    /// 断开全部会话
    ///
    /// 单个会话断开失败不影响其他会话；没有会话时直接返回
    pub async fn shutdown(&self) -> ShutdownReport {
        let _guard = self.bootstrap_lock.lock().await;
        self.set_state(LifecycleState::Stopping);

        let sessions = self.sessions.drain();
        let mut report = ShutdownReport::default();
        if sessions.is_empty() {
            debug!("没有需要断开的 Kafka 消费者");
            self.set_state(LifecycleState::Stopped);
            return report;
        }

        info!(sessions = sessions.len(), "断开 Kafka 消费者");
        let results = join_all(sessions.iter().map(|session| async move {
            let result = session.disconnect().await;
            match &result {
                Ok(()) => info!(group_id = %session.group_id(), "Kafka 消费者已断开"),
                Err(e) => error!(group_id = %session.group_id(), error = %e, "断开 Kafka 消费者失败"),
            }
            result
        }))
        .await;

        for (session, result) in sessions.iter().zip(results) {
            match result {
                Ok(()) => report.disconnected.push(session.group_id().to_string()),
                Err(e) => report
                    .failures
                    .push((session.group_id().to_string(), e.to_string())),
            }
        }

        self.set_state(LifecycleState::Stopped);
        report
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.write() = state;
    }

    /// 当前持有的会话
    pub fn sessions(&self) -> Vec<Arc<ConsumerSession>> {
        self.sessions.snapshot()
    }

    /// 已登记的 groupId
    pub fn group_ids(&self) -> Vec<String> {
        self.groups.group_ids()
    }

    /// 最近一次启动的结果
    pub fn last_report(&self) -> Option<BootstrapReport> {
        self.last_report.read().clone()
    }
}

impl std::fmt::Debug for KafkaExplorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaExplorer")
            .field("state", &self.state())
            .field("initialized", &self.is_initialized())
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

#[async_trait]
impl Lifecycle for KafkaExplorer {
    async fn on_start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.explore().await?;
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let report = self.shutdown().await;
        if !report.is_clean() {
            warn!(failures = report.failures.len(), "部分 Kafka 消费者未能正常断开");
        }
        Ok(())
    }

    fn lifecycle_state(&self) -> LifecycleState {
        self.state()
    }
}

#[async_trait]
impl HealthCheckable for KafkaExplorer {
    async fn check_health(&self) -> HealthStatus {
        let Some(report) = self.last_report() else {
            return HealthStatus::healthy();
        };
        if report.handlers == 0 {
            return HealthStatus::healthy();
        }

        let sessions = self.sessions();
        let running = sessions.iter().filter(|session| session.is_running()).count();

        if running == 0 {
            return HealthStatus::unhealthy(format!(
                "{} 个处理方法中没有运行中的消费者",
                report.handlers
            ));
        }

        if running < report.handlers {
            let details: HashMap<String, String> = report
                .bind_failures
                .iter()
                .map(|location| (location.to_string(), "未绑定".to_string()))
                .collect();
            return HealthStatus::degraded_with_details(
                format!("{}/{} 个消费者运行中", running, report.handlers),
                details,
            );
        }

        HealthStatus::healthy()
    }

    fn name(&self) -> &str {
        "kafka-explorer"
    }
}
