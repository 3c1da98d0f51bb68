//! 主题预置

use messaging_abstractions::{BrokerError, KafkaAdmin, KafkaClient, MessagingError, TopicSpec};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 确保订阅的主题存在
///
/// 每次调用使用独立的管理端会话，结束时无论成功与否都会断开
#[derive(Clone)]
pub struct TopicProvisioner {
    client: Arc<dyn KafkaClient>,
}

impl TopicProvisioner {
    pub fn new(client: Arc<dyn KafkaClient>) -> Self {
        Self { client }
    }

    /// 主题不存在时以 1 分区、1 副本创建，返回是否真正创建
    ///
    /// 并发调用之间不做协调，另一方抢先创建的情况按成功处理
    pub async fn ensure_topic(&self, topic: &str) -> Result<bool, MessagingError> {
        let admin = self.client.admin();
        let result = Self::ensure_with(admin.as_ref(), topic).await;

        if let Err(e) = admin.disconnect().await {
            warn!(topic = %topic, error = %e, "断开 Kafka 管理端失败");
        }

        result.map_err(|source| {
            error!(topic = %topic, error = %source, "确保主题存在失败");
            MessagingError::Provisioning {
                topic: topic.to_string(),
                source,
            }
        })
    }

    async fn ensure_with(admin: &dyn KafkaAdmin, topic: &str) -> Result<bool, BrokerError> {
        admin.connect().await?;

        let topics = admin.list_topics().await?;
        if topics.iter().any(|existing| existing == topic) {
            debug!(topic = %topic, "主题已存在");
            return Ok(false);
        }

        match admin.create_topics(&[TopicSpec::with_defaults(topic)]).await {
            Ok(created) => {
                if created {
                    info!(topic = %topic, "已创建主题");
                }
                Ok(created)
            }
            Err(BrokerError::TopicAlreadyExists { .. }) => {
                debug!(topic = %topic, "主题已由其他调用方创建");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
