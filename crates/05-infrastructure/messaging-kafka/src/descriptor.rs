//! 处理方法描述

use messaging_abstractions::{HandlerLocation, KafkaConsumerOptions, MessageHandler};

/// 发现阶段产出的一个可绑定处理方法
#[derive(Clone)]
pub struct HandlerDescriptor {
    /// 处理方法位置：模块 > 组件 > 方法
    pub location: HandlerLocation,
    /// 订阅与消费者组配置
    pub options: KafkaConsumerOptions,
    /// 已绑定到组件实例的调用入口
    pub invoke: MessageHandler,
}

impl HandlerDescriptor {
    pub fn new(location: HandlerLocation, options: KafkaConsumerOptions, invoke: MessageHandler) -> Self {
        Self {
            location,
            options,
            invoke,
        }
    }

    pub fn group_id(&self) -> &str {
        self.options.group_id()
    }

    pub fn component_name(&self) -> &str {
        &self.location.component
    }

    pub fn method_name(&self) -> &str {
        &self.location.method
    }

    /// 需要确保存在的主题
    pub fn topic_names(&self) -> Vec<&str> {
        self.options.subscribe.topic_names()
    }
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("location", &self.location)
            .field("options", &self.options)
            .finish()
    }
}
