//! 配置源管理
//!
//! 按登记顺序叠加配置源，后登记的覆盖先登记的；内置默认值优先级最低，
//! 环境变量通常最后登记。Kafka 配置从 `kafka` 节读取。

use infrastructure_common::ConfigError;
use messaging_abstractions::KafkaConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Kafka 配置所在的节
pub const KAFKA_SECTION: &str = "kafka";

/// 环境变量中节与键之间的分隔符，例如 `ADSP__KAFKA__BROKERS`
pub const ENV_SEPARATOR: &str = "__";

/// 配置源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSourceType {
    /// TOML 文件
    Toml,
    /// JSON 文件
    Json,
    /// YAML 文件
    Yaml,
    /// 环境变量
    Environment,
}

impl ConfigSourceType {
    /// 按文件扩展名推断类型
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    fn file_format(self) -> Option<config::FileFormat> {
        match self {
            Self::Toml => Some(config::FileFormat::Toml),
            Self::Json => Some(config::FileFormat::Json),
            Self::Yaml => Some(config::FileFormat::Yaml),
            Self::Environment => None,
        }
    }
}

/// 配置源描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSourceDescriptor {
    /// 配置源类型
    pub source_type: ConfigSourceType,
    /// 文件路径或环境变量前缀
    pub location: String,
}

/// 配置源集合，负责把各配置源合并后绑定为 [`KafkaConfig`]
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    sources: Vec<ConfigSourceDescriptor>,
}

impl ConfigSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加配置文件，文件必须存在
    pub fn add_file(
        &mut self,
        path: impl AsRef<Path>,
        source_type: ConfigSourceType,
    ) -> Result<(), ConfigError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        if source_type == ConfigSourceType::Environment {
            return Err(ConfigError::ValidationError {
                message: format!("{} 不是文件配置源", path.display()),
            });
        }
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        info!("添加 {:?} 配置文件: {}", source_type, path.display());
        self.sources.push(ConfigSourceDescriptor {
            source_type,
            location: path.display().to_string(),
        });
        Ok(())
    }

    /// 添加环境变量配置源
    pub fn add_env(&mut self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        info!("添加环境变量配置源，前缀: {}", prefix);
        self.sources.push(ConfigSourceDescriptor {
            source_type: ConfigSourceType::Environment,
            location: prefix,
        });
    }

    /// 已登记的配置源，按优先级从低到高
    pub fn sources(&self) -> &[ConfigSourceDescriptor] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// 合并全部配置源并读取 `kafka` 节，缺失的字段使用默认值
    pub fn load_kafka_config(&self) -> Result<KafkaConfig, ConfigError> {
        let mut builder = config::Config::builder();

        for source in &self.sources {
            builder = match source.source_type.file_format() {
                Some(format) => {
                    builder.add_source(config::File::new(&source.location, format).required(true))
                }
                None => builder.add_source(environment_source(&source.location)),
            };
        }

        let settings = builder.build().map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })?;

        match settings.get::<KafkaConfig>(KAFKA_SECTION) {
            Ok(kafka) => {
                debug!(
                    client_id = %kafka.client_id,
                    brokers = ?kafka.brokers,
                    "已加载 Kafka 配置"
                );
                Ok(kafka)
            }
            Err(config::ConfigError::NotFound(_)) => {
                debug!("未找到 {} 配置节，使用默认 Kafka 配置", KAFKA_SECTION);
                Ok(KafkaConfig::default())
            }
            Err(e) => Err(ConfigError::ParseError {
                source: Box::new(e),
            }),
        }
    }
}

fn environment_source(prefix: &str) -> config::Environment {
    let brokers_key = format!("{}.brokers", KAFKA_SECTION);
    config::Environment::with_prefix(prefix)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .list_separator(",")
        .with_list_parse_key(&brokers_key)
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_no_sources_yields_defaults() {
        let config = ConfigSources::new().load_kafka_config().unwrap();
        assert_eq!(config, KafkaConfig::default());
    }

    #[test]
    fn test_toml_file_is_loaded() {
        let file = temp_file(
            ".toml",
            r#"
            [kafka]
            client_id = "orders"
            brokers = ["localhost:9092", "localhost:9093"]
            request_timeout_ms = 5000
            "#,
        );

        let mut sources = ConfigSources::new();
        sources.add_file(file.path(), ConfigSourceType::Toml).unwrap();
        let config = sources.load_kafka_config().unwrap();

        assert_eq!(config.client_id, "orders");
        assert_eq!(config.brokers.len(), 2);
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.connection_timeout_ms, 1000);
    }

    #[test]
    fn test_later_file_overrides_earlier() {
        let base = temp_file(
            ".json",
            r#"{"kafka": {"client_id": "base", "brokers": ["a:9092"]}}"#,
        );
        let overlay = temp_file(".yaml", "kafka:\n  client_id: overlay\n");

        let mut sources = ConfigSources::new();
        sources.add_file(base.path(), ConfigSourceType::Json).unwrap();
        sources.add_file(overlay.path(), ConfigSourceType::Yaml).unwrap();
        let config = sources.load_kafka_config().unwrap();

        assert_eq!(config.client_id, "overlay");
        assert_eq!(config.brokers, vec!["a:9092".to_string()]);
    }

    #[test]
    fn test_missing_file_is_rejected() {
        let mut sources = ConfigSources::new();
        let error = sources
            .add_file("/definitely/not/here.toml", ConfigSourceType::Toml)
            .unwrap_err();
        assert!(matches!(error, ConfigError::FileNotFound { .. }));
        assert!(sources.is_empty());
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let file = temp_file(".toml", "[kafka\nbrokers = ");
        let mut sources = ConfigSources::new();
        sources.add_file(file.path(), ConfigSourceType::Toml).unwrap();
        assert!(matches!(
            sources.load_kafka_config(),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = temp_file(".toml", "[kafka]\nclient_id = \"file\"\n");
        std::env::set_var("CSTEST__KAFKA__CLIENT_ID", "from-env");
        std::env::set_var("CSTEST__KAFKA__BROKERS", "k1:9092,k2:9092");

        let mut sources = ConfigSources::new();
        sources.add_file(file.path(), ConfigSourceType::Toml).unwrap();
        sources.add_env("CSTEST");
        let config = sources.load_kafka_config();

        std::env::remove_var("CSTEST__KAFKA__CLIENT_ID");
        std::env::remove_var("CSTEST__KAFKA__BROKERS");

        let config = config.unwrap();
        assert_eq!(config.client_id, "from-env");
        assert_eq!(config.brokers, vec!["k1:9092".to_string(), "k2:9092".to_string()]);
    }

    #[test]
    fn test_source_type_from_extension() {
        assert_eq!(
            ConfigSourceType::from_extension(Path::new("app.yml")),
            Some(ConfigSourceType::Yaml)
        );
        assert_eq!(
            ConfigSourceType::from_extension(Path::new("app.TOML")),
            Some(ConfigSourceType::Toml)
        );
        assert_eq!(ConfigSourceType::from_extension(Path::new("app.ini")), None);
    }
}
