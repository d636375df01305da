//! 消息模型
//!
//! 定义订单领域事件在消息总线上的 JSON 格式（snake_case），
//! 以及审计服务 HTTP 接口的请求/响应模型。生产者（order-service）
//! 和消费者（audit-consumer）共用同一份定义，保证两端字段一致。

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Routing key 常量
// ---------------------------------------------------------------------------

/// 集中管理所有 routing key，防止字符串散落在各服务中导致拼写不一致
pub mod routing_keys {
    pub const ORDER_CREATED: &str = "order.created";
    pub const ORDER_STATUS_CHANGED: &str = "order.status.changed";
}

/// 带固定 routing key 的领域事件
pub trait RoutedMessage: Serialize + DeserializeOwned + Send {
    const ROUTING_KEY: &'static str;
}

// ---------------------------------------------------------------------------
// 领域事件
// ---------------------------------------------------------------------------

/// 订单项快照，嵌入在 OrderCreated 事件中
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemMessage {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub product_title: String,
    pub product_url: String,
    pub price_cents: i64,
    pub price_currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 订单创建事件
///
/// 每个新订单恰好一条，携带且仅携带该订单自己的订单项。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedMessage {
    pub id: i64,
    pub customer_id: i64,
    pub delivery_address: String,
    pub total_price_cents: i64,
    pub total_price_currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub order_items: Vec<OrderItemMessage>,
}

impl RoutedMessage for OrderCreatedMessage {
    const ROUTING_KEY: &'static str = routing_keys::ORDER_CREATED;
}

/// 订单状态变更事件
///
/// 每个 (订单, 订单项) 组合一条。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedMessage {
    pub order_id: i64,
    pub order_item_id: i64,
    pub customer_id: i64,
    pub order_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoutedMessage for OrderStatusChangedMessage {
    const ROUTING_KEY: &'static str = routing_keys::ORDER_STATUS_CHANGED;
}

// ---------------------------------------------------------------------------
// OutgoingMessage
// ---------------------------------------------------------------------------

/// 待发布的消息
///
/// `message_id` 与 outbox 行的 event_id 一致；重复投递不做去重，会在审计表中留下重复记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub message_id: Uuid,
    pub routing_key: String,
    pub payload: serde_json::Value,
}

impl OutgoingMessage {
    /// 由领域事件构造，routing key 取自事件类型
    pub fn from_event<T: RoutedMessage>(event: &T) -> Result<Self> {
        Ok(Self {
            message_id: Uuid::now_v7(),
            routing_key: T::ROUTING_KEY.to_string(),
            payload: serde_json::to_value(event)?,
        })
    }

    /// 序列化后的消息体
    pub fn body(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.payload)?)
    }
}

// ---------------------------------------------------------------------------
// 审计服务接口模型
// ---------------------------------------------------------------------------

/// 单条审计记录（请求侧）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogOrder {
    pub order_id: i64,
    pub order_item_id: i64,
    pub customer_id: i64,
    pub order_status: String,
}

/// POST /api/v1/audit/log-order 请求体
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogOrdersRequest {
    pub orders: Vec<AuditLogOrder>,
}

/// 已持久化的审计记录（响应侧）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogOrderRecord {
    pub order_id: i64,
    pub order_item_id: i64,
    pub customer_id: i64,
    pub order_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST /api/v1/audit/log-order 响应体
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogOrdersResponse {
    pub orders: Vec<AuditLogOrderRecord>,
}
