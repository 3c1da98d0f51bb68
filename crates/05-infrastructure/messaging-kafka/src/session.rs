//! 消费者会话

use crate::descriptor::HandlerDescriptor;
use chrono::{DateTime, Utc};
use messaging_abstractions::{KafkaConsumer, MessagingError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 会话状态
///
/// `Disconnected -> Connecting -> Subscribed -> Running -> Disconnecting -> Disconnected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Subscribed,
    Running,
    Disconnecting,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::Running => "running",
            Self::Disconnecting => "disconnecting",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一个处理方法对应的活动消费者
///
/// 会话不会被复用，断开后只能丢弃
pub struct ConsumerSession {
    id: Uuid,
    descriptor: Arc<HandlerDescriptor>,
    consumer: Box<dyn KafkaConsumer>,
    state: RwLock<SessionState>,
    created_at: DateTime<Utc>,
}

impl ConsumerSession {
    pub(crate) fn new(descriptor: Arc<HandlerDescriptor>, consumer: Box<dyn KafkaConsumer>) -> Self {
        Self {
            id: Uuid::new_v4(),
            descriptor,
            consumer,
            state: RwLock::new(SessionState::Disconnected),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn group_id(&self) -> &str {
        self.descriptor.group_id()
    }

    pub fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    pub(crate) fn consumer(&self) -> &dyn KafkaConsumer {
        self.consumer.as_ref()
    }

    pub(crate) fn transition(&self, next: SessionState) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        debug!(group_id = %self.group_id(), from = %previous, to = %next, "消费者会话状态变更");
    }

    /// 断开会话；只有第一次调用会真正断开
    pub async fn disconnect(&self) -> Result<(), MessagingError> {
        {
            let mut state = self.state.write();
            if matches!(*state, SessionState::Disconnected | SessionState::Disconnecting) {
                return Ok(());
            }
            *state = SessionState::Disconnecting;
        }

        let result = self.consumer.disconnect().await;
        self.transition(SessionState::Disconnected);

        result.map_err(|source| MessagingError::Disconnect {
            group_id: self.group_id().to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for ConsumerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerSession")
            .field("id", &self.id)
            .field("group_id", &self.group_id())
            .field("handler", &self.descriptor.location)
            .field("state", &self.state())
            .finish()
    }
}

/// 编排器持有的会话列表
#[derive(Debug, Default)]
pub struct SessionSet {
    sessions: Mutex<Vec<Arc<ConsumerSession>>>,
}

impl SessionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, session: Arc<ConsumerSession>) {
        self.sessions.lock().push(session);
    }

    /// 当前会话的快照
    pub fn snapshot(&self) -> Vec<Arc<ConsumerSession>> {
        self.sessions.lock().clone()
    }

    /// 取出全部会话
    pub fn drain(&self) -> Vec<Arc<ConsumerSession>> {
        std::mem::take(&mut *self.sessions.lock())
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
