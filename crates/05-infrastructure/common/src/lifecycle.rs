//! 组件生命周期管理

use async_trait::async_trait;

/// 组件生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// 未初始化
    #[default]
    Uninitialized,
    /// 初始化中
    Initializing,
    /// 运行中
    Running,
    /// 停止中
    Stopping,
    /// 已停止
    Stopped,
    /// 错误状态
    Error,
}

impl LifecycleState {
    /// 状态名称，用于日志输出
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 组件生命周期管理 trait
///
/// 由宿主进程在启动和关闭阶段依次调用
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// 组件启动
    async fn on_start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// 组件停止
    async fn on_stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// 获取生命周期状态
    fn lifecycle_state(&self) -> LifecycleState;
}
