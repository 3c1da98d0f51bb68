//! 消息基础设施构建器

use crate::config_sources::{ConfigSourceType, ConfigSources};
use crate::infrastructure::MessagingInfrastructure;
use di_impl::DiContainerImpl;
use infrastructure_common::{Component, ConfigError, HealthCheckable, InfrastructureError};
use messaging_abstractions::{KafkaClient, KafkaConfig, KafkaProcessor};
use messaging_kafka::{KafkaExplorer, KafkaMetadataAccessor, KafkaProducerService};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// 消息基础设施构建器
///
/// 使用建造者模式装配配置、组件容器、处理器元数据和 broker 客户端
pub struct MessagingInfrastructureBuilder {
    /// 配置源列表
    config_sources: ConfigSources,
    /// 直接指定的 Kafka 配置，优先于配置源
    kafka_config: Option<KafkaConfig>,
    /// broker 客户端
    client: Option<Arc<dyn KafkaClient>>,
    /// 组件容器
    container: Arc<DiContainerImpl>,
    /// 处理器元数据
    accessor: Arc<KafkaMetadataAccessor>,
    /// 额外的健康检查器
    health_checks: Vec<Box<dyn HealthCheckable>>,
    /// 配置验证是否启用
    validation_enabled: bool,
    /// 是否启用日志初始化
    logging_enabled: bool,
    /// 日志配置
    logging_config: LoggingConfig,
}

impl MessagingInfrastructureBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config_sources: ConfigSources::new(),
            kafka_config: None,
            client: None,
            container: Arc::new(DiContainerImpl::new()),
            accessor: Arc::new(KafkaMetadataAccessor::new()),
            health_checks: Vec::new(),
            validation_enabled: true,
            logging_enabled: false,
            logging_config: LoggingConfig::default(),
        }
    }

    /// 直接指定 Kafka 配置，不再读取配置源
    pub fn with_kafka_config(mut self, config: KafkaConfig) -> Self {
        self.kafka_config = Some(config);
        self
    }

    /// 添加 TOML 配置文件
    pub fn add_config_toml<P: AsRef<Path>>(self, path: P) -> Result<Self, InfrastructureError> {
        self.add_config_file(path, ConfigSourceType::Toml)
    }

    /// 添加 JSON 配置文件
    pub fn add_config_json<P: AsRef<Path>>(self, path: P) -> Result<Self, InfrastructureError> {
        self.add_config_file(path, ConfigSourceType::Json)
    }

    /// 添加 YAML 配置文件
    pub fn add_config_yaml<P: AsRef<Path>>(self, path: P) -> Result<Self, InfrastructureError> {
        self.add_config_file(path, ConfigSourceType::Yaml)
    }

    /// 添加配置文件，类型按扩展名推断
    pub fn add_config_file_auto<P: AsRef<Path>>(self, path: P) -> Result<Self, InfrastructureError> {
        let path = path.as_ref();
        let source_type =
            ConfigSourceType::from_extension(path).ok_or_else(|| ConfigError::ValidationError {
                message: format!("无法识别的配置文件类型: {}", path.display()),
            })?;
        self.add_config_file(path, source_type)
    }

    fn add_config_file<P: AsRef<Path>>(
        mut self,
        path: P,
        source_type: ConfigSourceType,
    ) -> Result<Self, InfrastructureError> {
        self.config_sources.add_file(path, source_type)?;
        Ok(self)
    }

    /// 添加环境变量配置源，例如前缀 `ADSP` 对应 `ADSP__KAFKA__BROKERS`
    pub fn add_config_env_vars<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config_sources.add_env(prefix);
        self
    }

    /// 指定 broker 客户端
    pub fn with_client(mut self, client: Arc<dyn KafkaClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// 注册处理器：写入组件容器并登记其消费者元数据
    pub fn register_processor<T>(self, processor: Arc<T>) -> Result<Self, InfrastructureError>
    where
        T: Component + KafkaProcessor,
    {
        self.accessor.register_processor::<T>();
        self.container
            .register_singleton_with_methods(processor, T::method_names())?;
        Ok(self)
    }

    /// 注册普通组件
    pub fn register_component<T: Component>(
        self,
        component: Arc<T>,
    ) -> Result<Self, InfrastructureError> {
        self.container.register_singleton(component)?;
        Ok(self)
    }

    /// 添加健康检查器
    pub fn add_health_check<T: HealthCheckable + 'static>(mut self, checker: T) -> Self {
        info!("添加健康检查器: {}", checker.name());
        self.health_checks.push(Box::new(checker));
        self
    }

    /// 启用或禁用配置验证
    pub fn enable_validation(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    /// 配置日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging_config = config;
        self.logging_enabled = true;
        self
    }

    /// 构建基础设施实例
    pub async fn build(self) -> Result<MessagingInfrastructure, InfrastructureError> {
        // 只有在明确配置了日志时才初始化日志，避免测试中重复初始化
        if self.logging_enabled {
            self.initialize_logging()?;
        }

        info!("开始构建消息基础设施");

        let kafka_config = match self.kafka_config {
            Some(config) => config,
            None => self.config_sources.load_kafka_config()?,
        };

        if self.validation_enabled {
            kafka_config
                .validate()
                .map_err(|e| ConfigError::ValidationError {
                    message: e.to_string(),
                })?;
        }

        let client = match self.client {
            Some(client) => client,
            None => default_client(&kafka_config)?,
        };

        let explorer = Arc::new(KafkaExplorer::new(
            self.container.clone(),
            self.accessor.clone(),
            client.clone(),
        ));
        let producer = Arc::new(KafkaProducerService::new(client.as_ref(), &kafka_config));

        debug!(
            processors = self.accessor.processor_count(),
            "处理器元数据已登记"
        );

        let infrastructure = MessagingInfrastructure::new(
            kafka_config,
            self.container,
            explorer,
            producer,
            self.health_checks,
        );

        info!("消息基础设施构建完成");
        Ok(infrastructure)
    }

    /// 初始化日志系统
    fn initialize_logging(&self) -> Result<(), InfrastructureError> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.logging_config.level.as_str()));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(self.logging_config.show_target)
            .with_thread_ids(self.logging_config.show_thread_ids)
            .with_file(self.logging_config.show_file)
            .with_line_number(self.logging_config.show_line_number);

        if self.logging_config.json_format {
            subscriber.json().try_init()
        } else {
            subscriber.try_init()
        }
        .map_err(|e| InfrastructureError::BootstrapFailed {
            message: format!("日志初始化失败: {}", e),
        })?;

        info!("日志系统初始化完成");
        Ok(())
    }
}

impl Default for MessagingInfrastructureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "rdkafka")]
fn default_client(config: &KafkaConfig) -> Result<Arc<dyn KafkaClient>, InfrastructureError> {
    info!(brokers = ?config.brokers, "使用 rdkafka 客户端");
    Ok(Arc::new(messaging_kafka::RdKafkaClient::new(config.clone())))
}

#[cfg(not(feature = "rdkafka"))]
fn default_client(_config: &KafkaConfig) -> Result<Arc<dyn KafkaClient>, InfrastructureError> {
    Err(InfrastructureError::BootstrapFailed {
        message: "未指定 Kafka 客户端，且未启用 rdkafka 特性".to_string(),
    })
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志级别，`RUST_LOG` 存在时以其为准
    pub level: tracing::Level,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            show_target: true,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            json_format: false,
        }
    }

    /// 创建生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: true,
        }
    }
}
