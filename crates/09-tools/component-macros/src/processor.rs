//! `#[kafka_processor]` 宏实现
//!
//! 展开后保留原 impl 块（去掉 `#[kafka_consumer]` 属性），并生成：
//!
//! - 每个消费者方法一个隐藏的调用入口 `__kafka_consume_<method>`，
//!   负责把 JSON 值反序列化为参数类型后调用方法
//! - `KafkaProcessor` 实现，列出全部方法名和消费者声明

use crate::consumer::KafkaConsumerArgs;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use std::collections::HashMap;
use syn::{spanned::Spanned, Error, FnArg, ImplItem, ImplItemFn, ItemImpl, Result, Type};

const CONSUMER_ATTR: &str = "kafka_consumer";

/// 一个带 `#[kafka_consumer]` 的方法
struct ConsumerMethod {
    method: syn::Ident,
    payload: Type,
    with_message: bool,
    args: KafkaConsumerArgs,
}

/// 展开 `#[kafka_processor]`
pub fn expand(args: TokenStream2, mut item: ItemImpl) -> Result<TokenStream2> {
    if !args.is_empty() {
        return Err(Error::new(args.span(), "kafka_processor 不接受参数"));
    }
    if let Some((_, path, _)) = &item.trait_ {
        return Err(Error::new(
            path.span(),
            "kafka_processor 只能用于固有 impl 块，不能用于 trait 实现",
        ));
    }

    let mut method_names = Vec::new();
    let mut consumers = Vec::new();
    let mut groups: HashMap<String, syn::Ident> = HashMap::new();

    for impl_item in item.items.iter_mut() {
        let ImplItem::Fn(function) = impl_item else {
            continue;
        };
        if function.sig.receiver().is_some() {
            method_names.push(function.sig.ident.to_string());
        }

        let Some(consumer) = take_consumer(function)? else {
            continue;
        };

        let group_id = consumer.args.group_id.value();
        if let Some(previous) = groups.get(&group_id) {
            return Err(Error::new(
                consumer.args.group_id.span(),
                format!(
                    "groupId `{}` 已被方法 `{}` 使用，同一处理器内不能重复",
                    group_id, previous
                ),
            ));
        }
        groups.insert(group_id, consumer.method.clone());
        consumers.push(consumer);
    }

    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();

    let invokers = consumers.iter().map(invoker_tokens);
    let declarations = consumers.iter().map(|consumer| {
        let name = consumer.method.to_string();
        let invoker = invoker_ident(&consumer.method);
        let options = consumer.args.options_tokens();
        quote! {
            ::messaging_abstractions::ConsumerMethod::new(#name, #options, Self::#invoker)
        }
    });

    Ok(quote! {
        #item

        impl #impl_generics #self_ty #where_clause {
            #(#invokers)*
        }

        impl #impl_generics ::messaging_abstractions::KafkaProcessor for #self_ty #where_clause {
            fn method_names() -> ::messaging_abstractions::__private::Vec<&'static str> {
                ::std::vec![#(#method_names),*]
            }

            fn consumer_methods() -> ::messaging_abstractions::__private::Vec<
                ::messaging_abstractions::ConsumerMethod<Self>,
            > {
                ::std::vec![#(#declarations),*]
            }
        }
    })
}

/// 取出并校验方法上的 `#[kafka_consumer]`
fn take_consumer(function: &mut ImplItemFn) -> Result<Option<ConsumerMethod>> {
    let Some(position) = function
        .attrs
        .iter()
        .position(|attr| attr.path().is_ident(CONSUMER_ATTR))
    else {
        return Ok(None);
    };
    let attr = function.attrs.remove(position);
    if let Some(duplicate) = function
        .attrs
        .iter()
        .find(|attr| attr.path().is_ident(CONSUMER_ATTR))
    {
        return Err(Error::new(duplicate.span(), "每个方法只能声明一个 kafka_consumer"));
    }

    let args: KafkaConsumerArgs = attr.parse_args()?;
    let sig = &function.sig;

    if sig.asyncness.is_none() {
        return Err(Error::new(sig.fn_token.span(), "kafka_consumer 方法必须是 async fn"));
    }
    match sig.receiver() {
        Some(receiver) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(Error::new(
                sig.ident.span(),
                "kafka_consumer 方法的接收者必须是 &self",
            ))
        }
    }

    let typed: Vec<&Type> = sig
        .inputs
        .iter()
        .filter_map(|input| match input {
            FnArg::Typed(pat_type) => Some(pat_type.ty.as_ref()),
            FnArg::Receiver(_) => None,
        })
        .collect();
    let (payload, with_message) = match typed.as_slice() {
        [payload] => ((*payload).clone(), false),
        [payload, _message] => ((*payload).clone(), true),
        _ => {
            return Err(Error::new(
                sig.inputs.span(),
                "kafka_consumer 方法的参数应为 (&self, payload) 或 (&self, payload, message)",
            ))
        }
    };

    Ok(Some(ConsumerMethod {
        method: sig.ident.clone(),
        payload,
        with_message,
        args,
    }))
}

fn invoker_ident(method: &syn::Ident) -> syn::Ident {
    format_ident!("__kafka_consume_{}", method)
}

fn invoker_tokens(consumer: &ConsumerMethod) -> TokenStream2 {
    let method = &consumer.method;
    let invoker = invoker_ident(method);
    let payload = &consumer.payload;
    let call = if consumer.with_message {
        quote! { this.#method(payload, message).await }
    } else {
        quote! {{
            let _ = message;
            this.#method(payload).await
        }}
    };

    quote! {
        #[doc(hidden)]
        pub fn #invoker(
            this: ::messaging_abstractions::__private::Arc<Self>,
            value: ::messaging_abstractions::__private::serde_json::Value,
            message: ::messaging_abstractions::ConsumedMessage,
        ) -> ::messaging_abstractions::__private::BoxFuture<'static, ::messaging_abstractions::HandlerResult> {
            ::messaging_abstractions::__private::Box::pin(async move {
                let payload: #payload = match ::messaging_abstractions::__private::serde_json::from_value(value) {
                    ::core::result::Result::Ok(payload) => payload,
                    ::core::result::Result::Err(error) => {
                        return ::core::result::Result::Err(
                            ::messaging_abstractions::HandlerError::from(error),
                        );
                    }
                };
                let result: ::messaging_abstractions::HandlerResult =
                    #call.map_err(::core::convert::Into::into);
                result
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_str(item: TokenStream2) -> Result<String> {
        let item: ItemImpl = syn::parse2(item)?;
        expand(TokenStream2::new(), item).map(|tokens| tokens.to_string())
    }

    #[test]
    fn test_generates_invokers_and_processor_impl() {
        let expanded = expand_str(quote! {
            impl Orders {
                #[kafka_consumer(topics = ["orders"], group_id = "orders-group")]
                async fn on_created(&self, order: Order) -> Result<(), String> {
                    Ok(())
                }

                fn helper(&self) {}

                fn constructor() -> Self {
                    Orders
                }
            }
        })
        .unwrap();

        assert!(expanded.contains("__kafka_consume_on_created"));
        assert!(expanded.contains("KafkaProcessor for Orders"));
        assert!(expanded.contains("\"on_created\" , \"helper\""));
        assert!(!expanded.contains("\"constructor\""));
        assert!(!expanded.contains("# [kafka_consumer"));
    }

    #[test]
    fn test_duplicate_group_in_same_processor_is_rejected() {
        let error = expand_str(quote! {
            impl Orders {
                #[kafka_consumer(topics = ["a"], group_id = "g")]
                async fn first(&self, v: Value) -> Result<(), String> { Ok(()) }

                #[kafka_consumer(topics = ["b"], group_id = "g")]
                async fn second(&self, v: Value) -> Result<(), String> { Ok(()) }
            }
        })
        .unwrap_err();
        assert!(error.to_string().contains("first"));
    }

    #[test]
    fn test_consumer_must_be_async() {
        let error = expand_str(quote! {
            impl Orders {
                #[kafka_consumer(topics = ["a"], group_id = "g")]
                fn handle(&self, v: Value) -> Result<(), String> { Ok(()) }
            }
        })
        .unwrap_err();
        assert!(error.to_string().contains("async"));
    }

    #[test]
    fn test_consumer_arity_is_checked() {
        assert!(expand_str(quote! {
            impl Orders {
                #[kafka_consumer(topics = ["a"], group_id = "g")]
                async fn handle(&self) -> Result<(), String> { Ok(()) }
            }
        })
        .is_err());

        assert!(expand_str(quote! {
            impl Orders {
                #[kafka_consumer(topics = ["a"], group_id = "g")]
                async fn handle(&mut self, v: Value) -> Result<(), String> { Ok(()) }
            }
        })
        .is_err());
    }

    #[test]
    fn test_trait_impl_is_rejected() {
        assert!(expand_str(quote! {
            impl Handler for Orders {
                fn handle(&self) {}
            }
        })
        .is_err());
    }
}
