//! 审计日志仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oms_shared::error::Result;
use oms_shared::messages::AuditLogOrder;
use sqlx::{PgConnection, PgPool};

use super::traits::AuditLogRepositoryTrait;
use crate::models::AuditLogRecord;

pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在已有事务中批量插入
    pub async fn batch_insert_in_tx(
        tx: &mut PgConnection,
        records: &[AuditLogOrder],
        now: DateTime<Utc>,
    ) -> Result<Vec<AuditLogRecord>> {
        let order_ids: Vec<i64> = records.iter().map(|r| r.order_id).collect();
        let item_ids: Vec<i64> = records.iter().map(|r| r.order_item_id).collect();
        let customer_ids: Vec<i64> = records.iter().map(|r| r.customer_id).collect();
        let statuses: Vec<String> = records.iter().map(|r| r.order_status.clone()).collect();

        let mut rows = sqlx::query_as::<_, AuditLogRecord>(
            r#"
            INSERT INTO audit_log_order (order_id, order_item_id, customer_id, order_status,
                                         created_at, updated_at)
            SELECT t.order_id, t.order_item_id, t.customer_id, t.order_status, $5, $5
            FROM UNNEST($1::bigint[], $2::bigint[], $3::bigint[], $4::text[])
                 WITH ORDINALITY AS t(order_id, order_item_id, customer_id, order_status, ord)
            ORDER BY t.ord
            RETURNING id, order_id, order_item_id, customer_id, order_status, created_at, updated_at
            "#,
        )
        .bind(&order_ids)
        .bind(&item_ids)
        .bind(&customer_ids)
        .bind(&statuses)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }
}

#[async_trait]
impl AuditLogRepositoryTrait for AuditLogRepository {
    async fn batch_insert(
        &self,
        records: &[AuditLogOrder],
        now: DateTime<Utc>,
    ) -> Result<Vec<AuditLogRecord>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let rows = Self::batch_insert_in_tx(&mut *tx, records, now).await?;
        tx.commit().await?;

        Ok(rows)
    }
}
