//! # 依赖注入具体实现
//!
//! 提供显式装配的组件容器：组合根在启动阶段把组件实例注册进来，
//! 上层通过 [`ComponentRegistry`] 枚举它们。

use di_abstractions::{ComponentInstance, ComponentRegistry};
use infrastructure_common::{Component, DependencyError, TypeInfo};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tracing::{debug, info};

/// 组件注册信息
#[derive(Clone)]
struct ComponentRegistration {
    /// 组件实例快照
    component: ComponentInstance,
    /// 是否启用
    enabled: bool,
    /// 注册顺序
    sequence: usize,
}

/// 具体的依赖注入容器实现
#[derive(Default)]
pub struct DiContainerImpl {
    /// 组件注册信息
    registrations: RwLock<Vec<ComponentRegistration>>,
}

impl DiContainerImpl {
    /// 创建新的容器
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册单例组件
    pub fn register_singleton<T>(&self, instance: Arc<T>) -> Result<(), DependencyError>
    where
        T: Component,
    {
        self.register_singleton_with_methods(instance, Vec::new())
    }

    /// 注册单例组件，同时登记其声明的方法
    pub fn register_singleton_with_methods<T>(
        &self,
        instance: Arc<T>,
        method_names: Vec<&'static str>,
    ) -> Result<(), DependencyError>
    where
        T: Component,
    {
        let name = instance.name();
        if name.trim().is_empty() {
            return Err(DependencyError::RegistrationError {
                type_name: std::any::type_name::<T>().to_string(),
                message: "组件名称不能为空".to_string(),
            });
        }

        info!("注册单例组件: {} ({})", name, std::any::type_name::<T>());

        let enabled = instance.is_enabled();
        let component = ComponentInstance::new(name, instance.clone())
            .with_methods(method_names)
            .with_priority(instance.priority());
        self.insert(component, enabled);
        Ok(())
    }

    /// 按类型注册组件，暂不提供实例
    pub fn register_type<T>(&self, name: impl Into<String>) -> Result<(), DependencyError>
    where
        T: Component,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DependencyError::RegistrationError {
                type_name: std::any::type_name::<T>().to_string(),
                message: "组件名称不能为空".to_string(),
            });
        }

        info!("注册组件类型: {} ({})", name, std::any::type_name::<T>());
        self.insert(ComponentInstance::unresolved::<T>(name), true);
        Ok(())
    }

    fn insert(&self, component: ComponentInstance, enabled: bool) {
        let mut registrations = self.registrations.write();
        let sequence = registrations.len();
        let type_id = component.type_info.id;

        if let Some(existing) = registrations
            .iter_mut()
            .find(|registration| registration.component.type_info.id == type_id)
        {
            debug!("替换已注册组件: {}", existing.component.name);
            existing.component = component;
            existing.enabled = enabled;
            return;
        }

        registrations.push(ComponentRegistration {
            component,
            enabled,
            sequence,
        });
    }

    /// 解析组件
    pub fn resolve<T>(&self) -> Result<Arc<T>, DependencyError>
    where
        T: Component,
    {
        let type_id = TypeId::of::<T>();
        let registrations = self.registrations.read();

        registrations
            .iter()
            .find(|registration| registration.component.type_info.id == type_id)
            .and_then(|registration| registration.component.downcast::<T>())
            .ok_or_else(|| DependencyError::ComponentNotRegistered {
                type_name: std::any::type_name::<T>().to_string(),
            })
    }

    /// 检查组件是否已注册
    pub fn is_registered<T: Any>(&self) -> bool {
        self.is_registered_by_type_id(TypeId::of::<T>())
    }

    /// 检查组件是否已注册（通过 TypeId）
    pub fn is_registered_by_type_id(&self, type_id: TypeId) -> bool {
        self.registrations
            .read()
            .iter()
            .any(|registration| registration.component.type_info.id == type_id)
    }

    /// 获取所有已注册组件的类型信息
    pub fn get_registered_types(&self) -> Vec<TypeInfo> {
        self.registrations
            .read()
            .iter()
            .map(|registration| registration.component.type_info.clone())
            .collect()
    }

    /// 清理已注册的组件
    pub fn clear(&self) {
        let mut registrations = self.registrations.write();
        info!("清理容器，移除 {} 个组件", registrations.len());
        registrations.clear();
    }
}

impl ComponentRegistry for DiContainerImpl {
    fn get_instances(&self) -> Vec<ComponentInstance> {
        let mut registrations: Vec<ComponentRegistration> = self
            .registrations
            .read()
            .iter()
            .filter(|registration| registration.enabled)
            .cloned()
            .collect();

        registrations.sort_by(|a, b| {
            b.component
                .priority
                .cmp(&a.component.priority)
                .then(a.sequence.cmp(&b.sequence))
        });

        registrations
            .into_iter()
            .map(|registration| registration.component)
            .collect()
    }

    fn len(&self) -> usize {
        self.registrations
            .read()
            .iter()
            .filter(|registration| registration.enabled)
            .count()
    }
}
