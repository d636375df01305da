//! 审计日志模型

use chrono::{DateTime, Utc};
use oms_shared::messages::AuditLogOrderRecord;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 已持久化的审计记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AuditLogRecord {
    pub id: i64,
    pub order_id: i64,
    pub order_item_id: i64,
    pub customer_id: i64,
    pub order_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AuditLogRecord> for AuditLogOrderRecord {
    fn from(record: AuditLogRecord) -> Self {
        Self {
            order_id: record.order_id,
            order_item_id: record.order_item_id,
            customer_id: record.customer_id,
            order_status: record.order_status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
