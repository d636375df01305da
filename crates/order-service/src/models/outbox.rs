//! Outbox 事件模型

use chrono::{DateTime, Utc};
use oms_shared::messages::OutgoingMessage;
use sqlx::FromRow;
use uuid::Uuid;

/// outbox_events 表中的一行
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OutboxEvent {
    pub id: i64,
    pub event_id: Uuid,
    pub routing_key: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    pub fn to_message(&self) -> OutgoingMessage {
        OutgoingMessage {
            message_id: self.event_id,
            routing_key: self.routing_key.clone(),
            payload: self.payload.clone(),
        }
    }
}
