//! 内存版存储
//!
//! 实现与 PostgreSQL 版本相同的 trait，用于无外部依赖的测试和本地压测。
//! 事务在开始时拷贝一份快照，提交时整体写回；未提交即 drop 的事务不留痕迹。
//! 并发提交采用后写覆盖，不适合作为生产存储。

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oms_shared::error::{OmsError, Result};
use oms_shared::messages::{AuditLogOrder, OutgoingMessage};

use super::traits::{AuditLogRepositoryTrait, OrderStore, OrderTransaction, OutboxRepositoryTrait};
use crate::models::{
    AuditLogRecord, NewOrder, NewOrderItem, Order, OrderItem, OrderQuery, OrderStatus, OutboxEvent,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    orders: Vec<Order>,
    items: Vec<OrderItem>,
    outbox: Vec<OutboxEvent>,
    audit: Vec<AuditLogRecord>,
    last_order_id: i64,
    last_item_id: i64,
    last_outbox_id: i64,
    last_audit_id: i64,
}

/// 故障注入开关
#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    fail_item_insert: bool,
    fail_enqueue: bool,
}

#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Mutex<Faults>>,
}

fn poisoned<T>(_: T) -> OmsError {
    OmsError::Internal("内存存储锁已损坏".to_string())
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(poisoned)
    }

    fn faults(&self) -> Faults {
        self.faults.lock().map(|f| *f).unwrap_or_default()
    }

    /// 之后的订单项插入全部失败
    pub fn fail_item_inserts(&self) {
        if let Ok(mut f) = self.faults.lock() {
            f.fail_item_insert = true;
        }
    }

    /// 之后的 outbox 写入全部失败
    pub fn fail_enqueue(&self) {
        if let Ok(mut f) = self.faults.lock() {
            f.fail_enqueue = true;
        }
    }

    /// 直接写入一条指定 ID 的订单及其订单项
    pub fn seed_order(&self, order: Order) -> Result<()> {
        let mut state = self.state()?;
        state.last_order_id = state.last_order_id.max(order.id);
        for item in &order.order_items {
            state.last_item_id = state.last_item_id.max(item.id);
            state.items.push(item.clone());
        }
        state.orders.push(Order {
            order_items: Vec::new(),
            ..order
        });
        Ok(())
    }

    pub fn orders(&self) -> Vec<Order> {
        self.state().map(|s| s.orders.clone()).unwrap_or_default()
    }

    pub fn items(&self) -> Vec<OrderItem> {
        self.state().map(|s| s.items.clone()).unwrap_or_default()
    }

    pub fn outbox_events(&self) -> Vec<OutboxEvent> {
        self.state().map(|s| s.outbox.clone()).unwrap_or_default()
    }

    pub fn audit_records(&self) -> Vec<AuditLogRecord> {
        self.state().map(|s| s.audit.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let working = self.state()?.clone();
        Ok(InMemoryTransaction {
            shared: Arc::clone(&self.state),
            working,
            faults: self.faults(),
        })
    }

    async fn query_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        let state = self.state()?;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| query.ids.as_ref().is_none_or(|ids| ids.contains(&o.id)))
            .filter(|o| {
                query
                    .customer_ids
                    .as_ref()
                    .is_none_or(|ids| ids.contains(&o.customer_id))
            })
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.id);

        Ok(orders
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .collect())
    }

    async fn list_items(&self, order_ids: &[i64]) -> Result<Vec<OrderItem>> {
        Ok(items_of(&self.state()?.items, order_ids))
    }
}

fn items_of(items: &[OrderItem], order_ids: &[i64]) -> Vec<OrderItem> {
    let mut found: Vec<OrderItem> = items
        .iter()
        .filter(|i| order_ids.contains(&i.order_id))
        .cloned()
        .collect();
    found.sort_by_key(|i| (i.order_id, i.id));
    found
}

pub struct InMemoryTransaction {
    shared: Arc<Mutex<MemoryState>>,
    working: MemoryState,
    faults: Faults,
}

#[async_trait]
impl OrderTransaction for InMemoryTransaction {
    async fn insert_orders(&mut self, orders: &[NewOrder], now: DateTime<Utc>) -> Result<Vec<Order>> {
        let mut inserted = Vec::with_capacity(orders.len());
        for new in orders {
            self.working.last_order_id += 1;
            let order = Order {
                id: self.working.last_order_id,
                customer_id: new.customer_id,
                delivery_address: new.delivery_address.clone(),
                total_price_cents: new.total_price_cents,
                total_price_currency: new.total_price_currency.clone(),
                status: OrderStatus::Created,
                created_at: now,
                updated_at: now,
                order_items: Vec::new(),
            };
            self.working.orders.push(order.clone());
            inserted.push(order);
        }
        Ok(inserted)
    }

    async fn insert_items(
        &mut self,
        items: &[(i64, NewOrderItem)],
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderItem>> {
        if self.faults.fail_item_insert {
            return Err(OmsError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut inserted = Vec::with_capacity(items.len());
        for (order_id, new) in items {
            self.working.last_item_id += 1;
            let item = OrderItem {
                id: self.working.last_item_id,
                order_id: *order_id,
                product_id: new.product_id,
                quantity: new.quantity,
                product_title: new.product_title.clone(),
                product_url: new.product_url.clone(),
                price_cents: new.price_cents,
                price_currency: new.price_currency.clone(),
                created_at: now,
                updated_at: now,
            };
            self.working.items.push(item.clone());
            inserted.push(item);
        }
        Ok(inserted)
    }

    async fn lock_orders(&mut self, ids: &[i64]) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .working
            .orders
            .iter()
            .filter(|o| ids.contains(&o.id))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }

    async fn update_status(
        &mut self,
        ids: &[i64],
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let mut updated = Vec::new();
        for order in self.working.orders.iter_mut().filter(|o| ids.contains(&o.id)) {
            order.status = status;
            order.updated_at = now;
            updated.push(order.clone());
        }
        updated.sort_by_key(|o| o.id);
        Ok(updated)
    }

    async fn list_items(&mut self, order_ids: &[i64]) -> Result<Vec<OrderItem>> {
        Ok(items_of(&self.working.items, order_ids))
    }

    async fn enqueue_events(&mut self, messages: &[OutgoingMessage], now: DateTime<Utc>) -> Result<()> {
        if self.faults.fail_enqueue {
            return Err(OmsError::Database(sqlx::Error::PoolTimedOut));
        }

        for msg in messages {
            self.working.last_outbox_id += 1;
            self.working.outbox.push(OutboxEvent {
                id: self.working.last_outbox_id,
                event_id: msg.message_id,
                routing_key: msg.routing_key.clone(),
                payload: msg.payload.clone(),
                created_at: now,
                published_at: None,
            });
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let mut shared = self.shared.lock().map_err(poisoned)?;
        *shared = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl OutboxRepositoryTrait for InMemoryOrderStore {
    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxEvent>> {
        let state = self.state()?;
        Ok(state
            .outbox
            .iter()
            .filter(|e| e.published_at.is_none())
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn mark_published(&self, ids: &[i64], now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state()?;
        let mut marked = 0;
        for event in state
            .outbox
            .iter_mut()
            .filter(|e| ids.contains(&e.id) && e.published_at.is_none())
        {
            event.published_at = Some(now);
            marked += 1;
        }
        Ok(marked)
    }
}

#[async_trait]
impl AuditLogRepositoryTrait for InMemoryOrderStore {
    async fn batch_insert(
        &self,
        records: &[AuditLogOrder],
        now: DateTime<Utc>,
    ) -> Result<Vec<AuditLogRecord>> {
        let mut state = self.state()?;
        let mut inserted = Vec::with_capacity(records.len());
        for record in records {
            state.last_audit_id += 1;
            let row = AuditLogRecord {
                id: state.last_audit_id,
                order_id: record.order_id,
                order_item_id: record.order_item_id,
                customer_id: record.customer_id,
                order_status: record.order_status.clone(),
                created_at: now,
                updated_at: now,
            };
            state.audit.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order(customer_id: i64) -> NewOrder {
        NewOrder {
            customer_id,
            delivery_address: "addr".into(),
            total_price_cents: 100,
            total_price_currency: "RUB".into(),
            order_items: vec![],
        }
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_leaves_no_trace() {
        let store = InMemoryOrderStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_orders(&[new_order(1)], Utc::now()).await.unwrap();
        }
        assert!(store.orders().is_empty());

        let mut tx = store.begin().await.unwrap();
        tx.insert_orders(&[new_order(1)], Utc::now()).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.orders().len(), 1);
    }

    #[tokio::test]
    async fn test_query_paginates_by_id() {
        let store = InMemoryOrderStore::new();
        let mut tx = store.begin().await.unwrap();
        let orders: Vec<NewOrder> = (1..=5).map(new_order).collect();
        tx.insert_orders(&orders, Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        let page = store
            .query_orders(&OrderQuery {
                page: 2,
                page_size: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.iter().map(|o| o.id).collect::<Vec<_>>(), vec![3, 4]);

        let by_customer = store
            .query_orders(&OrderQuery {
                customer_ids: Some(vec![5]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_customer.len(), 1);
        assert_eq!(by_customer[0].customer_id, 5);
    }
}
