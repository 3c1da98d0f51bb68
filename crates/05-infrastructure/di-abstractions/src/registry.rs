//! 组件注册表抽象接口

use infrastructure_common::TypeInfo;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// 组件注册表 trait
///
/// 由组合根实现，向上层暴露当前进程中所有已知的组件实例
pub trait ComponentRegistry: Send + Sync {
    /// 获取所有组件实例
    fn get_instances(&self) -> Vec<ComponentInstance>;

    /// 已注册组件数量
    fn len(&self) -> usize {
        self.get_instances().len()
    }

    /// 注册表是否为空
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 组件实例
///
/// 仅按类型注册而尚未实例化的组件，`instance` 为 `None`
#[derive(Clone)]
pub struct ComponentInstance {
    /// 组件名称
    pub name: String,
    /// 组件类型信息
    pub type_info: TypeInfo,
    /// 组件实例
    pub instance: Option<Arc<dyn Any + Send + Sync>>,
    /// 组件声明的方法名称
    pub method_names: Vec<&'static str>,
    /// 组件优先级
    pub priority: i32,
}

impl ComponentInstance {
    /// 创建已实例化的组件
    pub fn new<T: Any + Send + Sync>(name: impl Into<String>, instance: Arc<T>) -> Self {
        Self {
            name: name.into(),
            type_info: TypeInfo::of::<T>(),
            instance: Some(instance as Arc<dyn Any + Send + Sync>),
            method_names: Vec::new(),
            priority: 0,
        }
    }

    /// 创建尚未实例化的组件
    pub fn unresolved<T: Any + Send + Sync>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_info: TypeInfo::of::<T>(),
            instance: None,
            method_names: Vec::new(),
            priority: 0,
        }
    }

    /// 设置方法名称
    pub fn with_methods(mut self, method_names: Vec<&'static str>) -> Self {
        self.method_names = method_names;
        self
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 实例的运行时类型，未实例化时返回 `None`
    pub fn instance_type_id(&self) -> Option<TypeId> {
        self.instance.as_ref().map(|instance| (**instance).type_id())
    }

    /// 转换为具体类型
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instance.clone()?.downcast::<T>().ok()
    }
}

impl std::fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.name)
            .field("type_info", &self.type_info.full_name())
            .field("instantiated", &self.instance.is_some())
            .field("method_names", &self.method_names)
            .field("priority", &self.priority)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct BillingService {
        region: &'static str,
    }

    #[test]
    fn test_instance_type_id_and_downcast() {
        let component = ComponentInstance::new("billing", Arc::new(BillingService { region: "cn" }))
            .with_methods(vec!["on_invoice"]);

        assert_eq!(component.instance_type_id(), Some(TypeId::of::<BillingService>()));
        assert_eq!(component.downcast::<BillingService>().unwrap().region, "cn");
        assert!(component.downcast::<String>().is_none());
        assert_eq!(component.method_names, vec!["on_invoice"]);
    }

    #[test]
    fn test_unresolved_instance_has_no_type() {
        let component = ComponentInstance::unresolved::<BillingService>("billing");

        assert!(component.instance_type_id().is_none());
        assert!(component.downcast::<BillingService>().is_none());
        assert_eq!(component.type_info.name, "BillingService");
    }
}
