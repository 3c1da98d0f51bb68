//! 健康检查相关接口定义

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 健康状态
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "data")]
pub enum HealthStatus {
    /// 健康状态
    Healthy,
    /// 降级状态
    Degraded {
        message: String,
        details: Option<HashMap<String, String>>,
    },
    /// 不健康状态
    Unhealthy {
        error: String,
        details: Option<HashMap<String, String>>,
    },
}

impl HealthStatus {
    /// 创建健康状态
    pub fn healthy() -> Self {
        Self::Healthy
    }

    /// 创建降级状态
    pub fn degraded(message: impl Into<String>) -> Self {
        Self::Degraded {
            message: message.into(),
            details: None,
        }
    }

    /// 创建降级状态（带详情）
    pub fn degraded_with_details(
        message: impl Into<String>,
        details: HashMap<String, String>,
    ) -> Self {
        Self::Degraded {
            message: message.into(),
            details: Some(details),
        }
    }

    /// 创建不健康状态
    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self::Unhealthy {
            error: error.into(),
            details: None,
        }
    }

    /// 检查是否健康
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 检查是否降级
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// 检查是否不健康
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy { .. })
    }
}

/// 可进行健康检查的组件
#[async_trait]
pub trait HealthCheckable: Send + Sync {
    /// 执行健康检查
    async fn check_health(&self) -> HealthStatus;

    /// 健康检查器名称
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(HealthStatus::healthy().is_healthy());

        let mut details = HashMap::new();
        details.insert("running".to_string(), "1".to_string());
        let degraded = HealthStatus::degraded_with_details("部分消费者未绑定", details);
        assert!(degraded.is_degraded());
        assert!(!degraded.is_healthy());

        assert!(HealthStatus::unhealthy("没有运行中的消费者").is_unhealthy());
    }
}
