//! 订单仓储（PostgreSQL）
//!
//! 批量写入统一使用 `INSERT ... SELECT FROM UNNEST(...)`，一条语句完成整批插入。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oms_shared::error::{OmsError, Result};
use oms_shared::messages::OutgoingMessage;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::traits::{OrderStore, OrderTransaction};
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem, OrderQuery, OrderStatus};

const ORDER_COLUMNS: &str = "id, customer_id, delivery_address, total_price_cents, \
     total_price_currency, status, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, product_title, product_url, \
     price_cents, price_currency, created_at, updated_at";

/// 订单存储
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    type Tx = PgOrderTransaction;

    async fn begin(&self) -> Result<PgOrderTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PgOrderTransaction { tx })
    }

    async fn query_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE ($1::bigint[] IS NULL OR id = ANY($1))
              AND ($2::bigint[] IS NULL OR customer_id = ANY($2))
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(query.ids.as_deref())
        .bind(query.customer_ids.as_deref())
        .bind(query.limit())
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn list_items(&self, order_ids: &[i64]) -> Result<Vec<OrderItem>> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let items = sqlx::query_as::<_, OrderItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, id
            "#
        ))
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

/// 订单事务
///
/// 持有 sqlx 事务，未调用 `commit` 就被 drop 时自动回滚。
pub struct PgOrderTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderTransaction for PgOrderTransaction {
    async fn insert_orders(&mut self, orders: &[NewOrder], now: DateTime<Utc>) -> Result<Vec<Order>> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let customer_ids: Vec<i64> = orders.iter().map(|o| o.customer_id).collect();
        let addresses: Vec<String> = orders.iter().map(|o| o.delivery_address.clone()).collect();
        let totals: Vec<i64> = orders.iter().map(|o| o.total_price_cents).collect();
        let currencies: Vec<String> = orders
            .iter()
            .map(|o| o.total_price_currency.clone())
            .collect();

        let mut inserted = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (customer_id, delivery_address, total_price_cents,
                                total_price_currency, status, created_at, updated_at)
            SELECT t.customer_id, t.delivery_address, t.total_price_cents,
                   t.total_price_currency, 'Created'::order_status, $5, $5
            FROM UNNEST($1::bigint[], $2::text[], $3::bigint[], $4::text[])
                 WITH ORDINALITY AS t(customer_id, delivery_address, total_price_cents,
                                      total_price_currency, ord)
            ORDER BY t.ord
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(&customer_ids)
        .bind(&addresses)
        .bind(&totals)
        .bind(&currencies)
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await?;

        // bigserial 按插入顺序递增，按 id 排序即恢复输入顺序
        inserted.sort_by_key(|o| o.id);
        ensure_count("orders", orders.len(), inserted.len())?;
        Ok(inserted)
    }

    async fn insert_items(
        &mut self,
        items: &[(i64, NewOrderItem)],
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderItem>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i64> = items.iter().map(|(id, _)| *id).collect();
        let product_ids: Vec<i64> = items.iter().map(|(_, i)| i.product_id).collect();
        let quantities: Vec<i32> = items.iter().map(|(_, i)| i.quantity).collect();
        let titles: Vec<String> = items.iter().map(|(_, i)| i.product_title.clone()).collect();
        let urls: Vec<String> = items.iter().map(|(_, i)| i.product_url.clone()).collect();
        let prices: Vec<i64> = items.iter().map(|(_, i)| i.price_cents).collect();
        let currencies: Vec<String> = items.iter().map(|(_, i)| i.price_currency.clone()).collect();

        let mut inserted = sqlx::query_as::<_, OrderItem>(&format!(
            r#"
            INSERT INTO order_items (order_id, product_id, quantity, product_title, product_url,
                                     price_cents, price_currency, created_at, updated_at)
            SELECT t.order_id, t.product_id, t.quantity, t.product_title, t.product_url,
                   t.price_cents, t.price_currency, $8, $8
            FROM UNNEST($1::bigint[], $2::bigint[], $3::int[], $4::text[], $5::text[],
                        $6::bigint[], $7::text[])
                 WITH ORDINALITY AS t(order_id, product_id, quantity, product_title, product_url,
                                      price_cents, price_currency, ord)
            ORDER BY t.ord
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(&order_ids)
        .bind(&product_ids)
        .bind(&quantities)
        .bind(&titles)
        .bind(&urls)
        .bind(&prices)
        .bind(&currencies)
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await?;

        inserted.sort_by_key(|i| i.id);
        ensure_count("order_items", items.len(), inserted.len())?;
        Ok(inserted)
    }

    async fn lock_orders(&mut self, ids: &[i64]) -> Result<Vec<Order>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(orders)
    }

    async fn update_status(
        &mut self,
        ids: &[i64],
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut updated = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
            SET status = $1, updated_at = $2
            WHERE id = ANY($3)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(status)
        .bind(now)
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;

        updated.sort_by_key(|o| o.id);
        Ok(updated)
    }

    async fn list_items(&mut self, order_ids: &[i64]) -> Result<Vec<OrderItem>> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let items = sqlx::query_as::<_, OrderItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, id
            "#
        ))
        .bind(order_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(items)
    }

    async fn enqueue_events(&mut self, messages: &[OutgoingMessage], now: DateTime<Utc>) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        let event_ids: Vec<Uuid> = messages.iter().map(|m| m.message_id).collect();
        let routing_keys: Vec<String> = messages.iter().map(|m| m.routing_key.clone()).collect();
        let payloads: Vec<serde_json::Value> = messages.iter().map(|m| m.payload.clone()).collect();

        sqlx::query(
            r#"
            INSERT INTO outbox_events (event_id, routing_key, payload, created_at)
            SELECT t.event_id, t.routing_key, t.payload, $4
            FROM UNNEST($1::uuid[], $2::text[], $3::jsonb[])
                 WITH ORDINALITY AS t(event_id, routing_key, payload, ord)
            ORDER BY t.ord
            "#,
        )
        .bind(&event_ids)
        .bind(&routing_keys)
        .bind(&payloads)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn ensure_count(table: &str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    Err(OmsError::Internal(format!(
        "{table} 批量插入行数不一致: expected={expected}, actual={actual}"
    )))
}
