//! 示例处理器

use component_macros::{kafka_processor, Component};
use messaging_abstractions::ConsumedMessage;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::info;

/// 订单创建事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreated {
    pub id: u64,
    pub amount_cents: u64,
}

/// 订单处理器，金额为 0 的订单会被拒绝
#[derive(Debug, Default, Component)]
#[component(name = "order-processor", priority = 10)]
pub struct OrderProcessor {
    accepted: AtomicU64,
    revenue_cents: AtomicU64,
}

#[kafka_processor]
impl OrderProcessor {
    #[kafka_consumer(topics = ["orders"], group_id = "order-service", from_beginning)]
    async fn on_order_created(&self, order: OrderCreated) -> Result<(), String> {
        if order.amount_cents == 0 {
            return Err(format!("订单 {} 金额为 0", order.id));
        }
        self.accepted.fetch_add(1, Ordering::SeqCst);
        self.revenue_cents
            .fetch_add(order.amount_cents, Ordering::SeqCst);
        info!(order_id = order.id, amount_cents = order.amount_cents, "订单已处理");
        Ok(())
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn revenue_cents(&self) -> u64 {
        self.revenue_cents.load(Ordering::SeqCst)
    }
}

/// 审计处理器，按模式订阅全部 `audit.*` 主题
#[derive(Debug, Default, Component)]
#[component(name = "audit-processor")]
pub struct AuditProcessor {
    topics: Mutex<Vec<String>>,
}

#[kafka_processor]
impl AuditProcessor {
    #[kafka_consumer(patterns = ["^audit\\..+"], group_id = "audit-service", from_beginning)]
    async fn on_audit(
        &self,
        payload: Option<serde_json::Value>,
        message: ConsumedMessage,
    ) -> Result<(), std::io::Error> {
        info!(topic = %message.topic, offset = message.offset, payload = ?payload, "收到审计事件");
        if let Ok(mut topics) = self.topics.lock() {
            topics.push(message.topic);
        }
        Ok(())
    }

    pub fn seen_topics(&self) -> Vec<String> {
        self.topics.lock().map(|topics| topics.clone()).unwrap_or_default()
    }
}
