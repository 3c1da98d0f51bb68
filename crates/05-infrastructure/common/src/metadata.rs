//! 元数据定义
//!
//! 提供组件类型的元数据信息

use std::any::TypeId;

/// 类型信息
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    /// 类型名称
    pub name: String,
    /// 类型ID
    pub id: TypeId,
    /// 模块路径
    pub module_path: String,
}

impl TypeInfo {
    /// 从类型获取类型信息
    pub fn of<T: 'static>() -> Self {
        let full_name = std::any::type_name::<T>();
        // 泛型参数里的路径不属于类型本身
        let path = full_name
            .split_once('<')
            .map_or(full_name, |(path, _)| path);
        let (module_path, name) = match path.rsplit_once("::") {
            Some((module, name)) => (module.to_string(), name.to_string()),
            None => (String::new(), path.to_string()),
        };
        Self {
            name,
            id: TypeId::of::<T>(),
            module_path,
        }
    }

    /// 获取完整的类型路径
    pub fn full_name(&self) -> String {
        if self.module_path.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.module_path, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OrderService;

    struct Envelope<T>(T);

    #[test]
    fn test_type_info_of() {
        let info = TypeInfo::of::<OrderService>();

        assert_eq!(info.name, "OrderService");
        assert_eq!(info.id, TypeId::of::<OrderService>());
        assert!(info.module_path.ends_with("metadata::tests"));
        assert!(info.full_name().ends_with("metadata::tests::OrderService"));
    }

    #[test]
    fn test_type_info_of_generic_type() {
        let info = TypeInfo::of::<Envelope<OrderService>>();

        assert_eq!(info.name, "Envelope");
        assert!(info.module_path.ends_with("metadata::tests"));
        assert!(!info.module_path.contains('<'));
        assert!(info.full_name().ends_with("metadata::tests::Envelope"));
    }
}
