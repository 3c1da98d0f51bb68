//! 消费者组唯一性登记

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use messaging_abstractions::{HandlerLocation, MessagingError};
use tracing::error;

/// 进程内的消费者组登记表
///
/// 同一个 groupId 只能属于一个处理方法，检查与写入在同一个分片锁内完成
#[derive(Debug, Default)]
pub struct GroupIdRegistry {
    groups: DashMap<String, HandlerLocation>,
}

impl GroupIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记 groupId，已被占用时返回冲突错误
    ///
    /// 只按 groupId 判断，不比较处理方法位置
    pub fn register_or_reject(
        &self,
        group_id: &str,
        location: &HandlerLocation,
    ) -> Result<(), MessagingError> {
        if group_id.trim().is_empty() {
            return Err(MessagingError::invalid_config(format!(
                "处理方法 {} 的 groupId 不能为空",
                location
            )));
        }

        match self.groups.entry(group_id.to_string()) {
            Entry::Occupied(entry) => {
                let error = MessagingError::DuplicateGroupId {
                    group_id: group_id.to_string(),
                    existing: entry.get().clone(),
                    conflicting: location.clone(),
                };
                error!(group_id = %group_id, "{}", error);
                Err(error)
            }
            Entry::Vacant(entry) => {
                entry.insert(location.clone());
                Ok(())
            }
        }
    }

    /// 释放 groupId，用于启动中止时回滚本轮登记
    pub fn release(&self, group_id: &str) -> bool {
        self.groups.remove(group_id).is_some()
    }

    pub fn contains(&self, group_id: &str) -> bool {
        self.groups.contains_key(group_id)
    }

    /// 占用 groupId 的处理方法
    pub fn owner_of(&self, group_id: &str) -> Option<HandlerLocation> {
        self.groups.get(group_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// 已登记的 groupId，按字典序
    pub fn group_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.groups.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }
}
