//! 组件派生宏实现

use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, Error, LitInt, LitStr, Result};

/// 组件参数
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentArgs {
    /// 组件优先级
    pub priority: i32,
    /// 自定义组件名称
    pub name: Option<String>,
    /// 是否启用
    pub enabled: bool,
}

impl Default for ComponentArgs {
    fn default() -> Self {
        Self {
            priority: 0,
            name: None,
            enabled: true,
        }
    }
}

impl ComponentArgs {
    /// 从 `#[component(...)]` 属性读取参数
    pub fn from_derive(input: &DeriveInput) -> Result<Self> {
        let mut args = Self::default();

        for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("component")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("priority") {
                    let lit: LitInt = meta.value()?.parse()?;
                    args.priority = lit.base10_parse()?;
                } else if meta.path.is_ident("name") {
                    let lit: LitStr = meta.value()?.parse()?;
                    if lit.value().trim().is_empty() {
                        return Err(Error::new(lit.span(), "组件名称不能为空"));
                    }
                    args.name = Some(lit.value());
                } else if meta.path.is_ident("disabled") {
                    args.enabled = false;
                } else {
                    return Err(meta.error("未知的 component 参数，可用: name、priority、disabled"));
                }
                Ok(())
            })?;
        }

        Ok(args)
    }
}

/// 实现 #[derive(Component)]
pub fn derive_component_impl(input: DeriveInput) -> Result<TokenStream2> {
    let args = ComponentArgs::from_derive(&input)?;
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let name = args.name.unwrap_or_else(|| to_kebab_case(&struct_name.to_string()));
    let priority = args.priority;
    let enabled = args.enabled;

    Ok(quote! {
        impl #impl_generics ::infrastructure_common::Component for #struct_name #ty_generics #where_clause {
            fn name(&self) -> &'static str {
                #name
            }

            fn priority(&self) -> i32 {
                #priority
            }

            fn is_enabled(&self) -> bool {
                #enabled
            }
        }
    })
}

/// `OrderProcessor` -> `order-processor`
fn to_kebab_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('-');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_args_defaults() {
        let args = ComponentArgs::default();

        assert_eq!(args.priority, 0);
        assert_eq!(args.name, None);
        assert!(args.enabled);
    }

    #[test]
    fn test_component_attribute_parsing() {
        let input: DeriveInput = syn::parse_quote! {
            #[component(name = "orders", priority = 10, disabled)]
            struct OrderProcessor;
        };
        let args = ComponentArgs::from_derive(&input).unwrap();

        assert_eq!(args.name.as_deref(), Some("orders"));
        assert_eq!(args.priority, 10);
        assert!(!args.enabled);
    }

    #[test]
    fn test_unknown_component_attribute_is_rejected() {
        let input: DeriveInput = syn::parse_quote! {
            #[component(lifetime = "scoped")]
            struct OrderProcessor;
        };
        assert!(ComponentArgs::from_derive(&input).is_err());
    }

    #[test]
    fn test_default_name_is_kebab_case() {
        assert_eq!(to_kebab_case("OrderProcessor"), "order-processor");
        assert_eq!(to_kebab_case("Audit"), "audit");
    }
}
