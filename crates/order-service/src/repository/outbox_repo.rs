//! Outbox 仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oms_shared::error::Result;
use sqlx::PgPool;

use super::traits::OutboxRepositoryTrait;
use crate::models::OutboxEvent;

pub struct OutboxRepository {
    pool: PgPool,
}

impl OutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxRepositoryTrait for OutboxRepository {
    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxEvent>> {
        let events = sqlx::query_as::<_, OutboxEvent>(
            r#"
            SELECT id, event_id, routing_key, payload, created_at, published_at
            FROM outbox_events
            WHERE published_at IS NULL
            ORDER BY id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn mark_published(&self, ids: &[i64], now: DateTime<Utc>) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET published_at = $1
            WHERE id = ANY($2) AND published_at IS NULL
            "#,
        )
        .bind(now)
        .bind(ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
