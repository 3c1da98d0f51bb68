//! `#[kafka_consumer]` 参数解析

use crate::utils::{expect_bool, expect_str, expect_str_list, expect_u64};
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{
    parse::Parse, parse::ParseStream, punctuated::Punctuated, spanned::Spanned, Error, LitStr,
    Meta, Result, Token,
};

/// 消费者声明参数
#[derive(Debug, Clone)]
pub struct KafkaConsumerArgs {
    /// 精确主题名
    pub topics: Vec<LitStr>,
    /// 正则订阅
    pub patterns: Vec<LitStr>,
    /// 消费者组
    pub group_id: LitStr,
    /// 是否从头消费
    pub from_beginning: bool,
    pub session_timeout_ms: Option<u64>,
    pub heartbeat_interval_ms: Option<u64>,
    pub allow_auto_topic_creation: Option<bool>,
}

impl Parse for KafkaConsumerArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut topics = Vec::new();
        let mut patterns = Vec::new();
        let mut group_id: Option<LitStr> = None;
        let mut from_beginning = false;
        let mut session_timeout_ms = None;
        let mut heartbeat_interval_ms = None;
        let mut allow_auto_topic_creation = None;

        let parsed = Punctuated::<Meta, Token![,]>::parse_terminated(input)?;

        for meta in parsed {
            match meta {
                Meta::Path(path) if path.is_ident("from_beginning") => {
                    from_beginning = true;
                }
                Meta::NameValue(nv) => {
                    let key = nv
                        .path
                        .get_ident()
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    match key.as_str() {
                        "topics" | "topic" => topics.extend(expect_str_list(&nv.value, &key)?),
                        "patterns" | "pattern" => {
                            patterns.extend(expect_str_list(&nv.value, &key)?)
                        }
                        "group_id" => group_id = Some(expect_str(&nv.value, &key)?),
                        "from_beginning" => from_beginning = expect_bool(&nv.value, &key)?,
                        "session_timeout_ms" => {
                            session_timeout_ms = Some(expect_u64(&nv.value, &key)?)
                        }
                        "heartbeat_interval_ms" => {
                            heartbeat_interval_ms = Some(expect_u64(&nv.value, &key)?)
                        }
                        "allow_auto_topic_creation" => {
                            allow_auto_topic_creation = Some(expect_bool(&nv.value, &key)?)
                        }
                        _ => {
                            return Err(Error::new(
                                nv.path.span(),
                                format!("未知的 kafka_consumer 参数: `{}`", key),
                            ))
                        }
                    }
                }
                other => {
                    return Err(Error::new(other.span(), "未知的 kafka_consumer 参数"));
                }
            }
        }

        let group_id = group_id
            .ok_or_else(|| Error::new(Span::call_site(), "kafka_consumer 缺少 `group_id`"))?;
        if group_id.value().trim().is_empty() {
            return Err(Error::new(group_id.span(), "`group_id` 不能为空"));
        }
        if topics.is_empty() && patterns.is_empty() {
            return Err(Error::new(
                Span::call_site(),
                "kafka_consumer 至少需要一个 `topics` 或 `patterns`",
            ));
        }
        if let Some(pattern) = patterns.iter().find(|pattern| pattern.value().is_empty()) {
            return Err(Error::new(pattern.span(), "订阅模式不能为空"));
        }

        Ok(Self {
            topics,
            patterns,
            group_id,
            from_beginning,
            session_timeout_ms,
            heartbeat_interval_ms,
            allow_auto_topic_creation,
        })
    }
}

impl KafkaConsumerArgs {
    /// 生成 `KafkaConsumerOptions` 构造表达式
    pub fn options_tokens(&self) -> TokenStream2 {
        let topics = self.topics.iter();
        let patterns = self.patterns.iter();
        let group_id = &self.group_id;
        let from_beginning = self.from_beginning;

        let session_timeout = self
            .session_timeout_ms
            .map(|value| quote! { let config = config.with_session_timeout_ms(#value); });
        let heartbeat_interval = self
            .heartbeat_interval_ms
            .map(|value| quote! { let config = config.with_heartbeat_interval_ms(#value); });
        let auto_topic_creation = self
            .allow_auto_topic_creation
            .map(|value| quote! { let config = config.with_allow_auto_topic_creation(#value); });

        quote! {
            ::messaging_abstractions::KafkaConsumerOptions::new(
                ::messaging_abstractions::ConsumerSubscribeTopics::new(::std::vec![
                    #(::messaging_abstractions::TopicSubscription::name(#topics),)*
                    #(::messaging_abstractions::TopicSubscription::pattern(#patterns),)*
                ])
                .from_beginning(#from_beginning),
                {
                    let config = ::messaging_abstractions::ConsumerConfig::new(#group_id);
                    #session_timeout
                    #heartbeat_interval
                    #auto_topic_creation
                    config
                },
            )
        }
    }
}
