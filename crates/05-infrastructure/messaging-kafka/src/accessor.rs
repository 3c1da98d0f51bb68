//! 处理器与消费者元数据访问
//!
//! 每个处理器类型在组合根登记一次，之后按 `(TypeId, 方法名)` 查询其消费者选项，
//! 并把类型擦除的组件实例绑定成可调用的 [`MessageHandler`]。

use di_abstractions::ComponentInstance;
use messaging_abstractions::{KafkaConsumerOptions, KafkaProcessor, MessageHandler};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

type HandlerBinder = Arc<dyn Fn(Arc<dyn Any + Send + Sync>) -> Option<MessageHandler> + Send + Sync>;

struct ConsumerMetadata {
    options: KafkaConsumerOptions,
    binder: HandlerBinder,
}

/// 处理器元数据访问器
#[derive(Default)]
pub struct KafkaMetadataAccessor {
    processors: RwLock<HashSet<TypeId>>,
    consumers: RwLock<HashMap<(TypeId, &'static str), ConsumerMetadata>>,
}

impl KafkaMetadataAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记处理器类型及其所有消费者方法，重复登记会覆盖旧的元数据
    pub fn register_processor<T: KafkaProcessor>(&self) {
        let type_id = TypeId::of::<T>();
        let methods = T::consumer_methods();
        debug!(
            processor = std::any::type_name::<T>(),
            consumers = methods.len(),
            "登记 Kafka 处理器"
        );

        let mut consumers = self.consumers.write();
        consumers.retain(|(owner, _), _| *owner != type_id);
        for method in methods {
            let name = method.name;
            let options = method.options.clone();
            let binder: HandlerBinder = Arc::new(move |instance: Arc<dyn Any + Send + Sync>| {
                instance
                    .downcast::<T>()
                    .ok()
                    .map(|typed| method.bind(typed))
            });
            consumers.insert((type_id, name), ConsumerMetadata { options, binder });
        }
        drop(consumers);

        self.processors.write().insert(type_id);
    }

    /// 类型是否被标记为处理器；没有运行时类型的组件一律不是
    pub fn is_processor(&self, type_id: Option<TypeId>) -> bool {
        type_id.map_or(false, |id| self.processors.read().contains(&id))
    }

    /// 读取方法上的消费者选项
    pub fn get_consumer_options(&self, type_id: TypeId, method: &str) -> Option<KafkaConsumerOptions> {
        self.consumers
            .read()
            .iter()
            .find(|((owner, name), _)| *owner == type_id && *name == method)
            .map(|(_, metadata)| metadata.options.clone())
    }

    /// 把组件实例上的方法绑定为处理函数
    pub fn bind_handler(&self, component: &ComponentInstance, method: &str) -> Option<MessageHandler> {
        let instance = component.instance.clone()?;
        let type_id = (*instance).type_id();
        let binder = self
            .consumers
            .read()
            .iter()
            .find(|((owner, name), _)| *owner == type_id && *name == method)
            .map(|(_, metadata)| metadata.binder.clone())?;
        binder(instance)
    }

    /// 已登记的处理器数量
    pub fn processor_count(&self) -> usize {
        self.processors.read().len()
    }
}

impl std::fmt::Debug for KafkaMetadataAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaMetadataAccessor")
            .field("processors", &self.processors.read().len())
            .field("consumers", &self.consumers.read().len())
            .finish()
    }
}
