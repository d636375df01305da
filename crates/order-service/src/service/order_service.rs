//! 订单服务
//!
//! 所有写操作遵循同一流程：校验 -> 在一个事务内写业务表 -> 同一事务内写 outbox -> 提交。
//! 事件由 `OutboxRelay` 在提交后异步发布，请求路径上不直接访问 broker，
//! 因此不会出现"数据已提交但事件丢失"或"事件已发出但数据回滚"。

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use oms_shared::error::{OmsError, Result};
use oms_shared::messages::OutgoingMessage;
use oms_shared::observability::metrics as oms_metrics;
use tracing::{debug, info, instrument, warn};

use crate::models::{NewOrder, NewOrderItem, Order, OrderQuery, OrderStatus, StatusUpdate};
use crate::repository::{OrderStore, OrderTransaction};
use crate::state_machine;

/// 单次查询允许的最大分页大小
pub const MAX_PAGE_SIZE: i64 = 1000;

pub struct OrderService<S> {
    store: Arc<S>,
}

impl<S> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: OrderStore> OrderService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 批量创建订单
    ///
    /// 返回带生成 ID、`Created` 状态、时间戳以及已落库订单项的订单。
    /// 每个订单恰好入队一条 OrderCreated 事件，事件只携带本订单的订单项。
    #[instrument(skip(self, orders), fields(count = orders.len()))]
    pub async fn batch_insert(&self, orders: Vec<NewOrder>) -> Result<Vec<Order>> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        // 1. 订单
        let mut created = tx.insert_orders(&orders, now).await?;
        if created.len() != orders.len() {
            return Err(OmsError::Internal(format!(
                "插入订单数量不一致: expected={}, actual={}",
                orders.len(),
                created.len()
            )));
        }

        // 2. 订单项，按位置关联生成的订单 ID
        let drafts: Vec<(i64, NewOrderItem)> = created
            .iter()
            .zip(&orders)
            .flat_map(|(order, new)| new.order_items.iter().map(|item| (order.id, item.clone())))
            .collect();
        let items = tx.insert_items(&drafts, now).await?;
        let item_count = items.len();
        Order::attach_items(&mut created, items);

        // 3. outbox
        let messages = created
            .iter()
            .map(|order| OutgoingMessage::from_event(&order.created_message()))
            .collect::<Result<Vec<_>>>()?;
        tx.enqueue_events(&messages, now).await?;

        tx.commit().await?;

        oms_metrics::record_orders_created(created.len());
        info!(
            orders = created.len(),
            items = item_count,
            events = messages.len(),
            "订单批量创建完成"
        );

        Ok(created)
    }

    /// 批量更新订单状态
    ///
    /// 所有分组先按更新前的状态完成校验，任何一个订单不合法则整个请求回滚，
    /// 不写任何数据、不产生任何事件。匹配不到订单的分组视为无操作。
    #[instrument(skip(self, updates), fields(groups = updates.len()))]
    pub async fn batch_update_status(&self, updates: Vec<StatusUpdate>) -> Result<Vec<Order>> {
        // 1. 解析目标状态
        let targets = updates
            .iter()
            .map(|u| Ok((u.order_ids.as_slice(), u.new_status.parse::<OrderStatus>()?)))
            .collect::<Result<Vec<_>>>()?;

        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        // 2. 加锁读取并校验
        let mut planned: Vec<(Vec<i64>, OrderStatus)> = Vec::with_capacity(targets.len());
        for (ids, target) in targets {
            if ids.is_empty() {
                continue;
            }

            let current = tx.lock_orders(ids).await?;
            if current.is_empty() {
                debug!(?ids, "未匹配到订单，跳过该分组");
                continue;
            }

            if let Err(e) = state_machine::validate_all(&current, target) {
                warn!(error = %e, "订单状态迁移不合法，回滚");
                tx.rollback().await?;
                return Err(e);
            }

            planned.push((current.iter().map(|o| o.id).collect(), target));
        }

        if planned.is_empty() {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        // 3. 执行更新
        let mut updated: Vec<Order> = Vec::new();
        for (ids, target) in &planned {
            let rows = tx.update_status(ids, *target, now).await?;
            oms_metrics::record_status_updates(target.as_str(), rows.len());
            updated.extend(rows);
        }

        // 4. 每个 (订单, 订单项) 一条状态变更事件
        let mut order_ids: Vec<i64> = updated.iter().map(|o| o.id).collect();
        order_ids.sort_unstable();
        order_ids.dedup();
        let items = tx.list_items(&order_ids).await?;

        let messages = updated
            .iter()
            .flat_map(|order| order.status_changed_messages(&items))
            .map(|event| OutgoingMessage::from_event(&event))
            .collect::<Result<Vec<_>>>()?;
        tx.enqueue_events(&messages, now).await?;

        tx.commit().await?;

        // 同一订单出现在多个分组时只返回最终状态
        let mut seen = HashSet::new();
        updated.reverse();
        updated.retain(|o| seen.insert(o.id));
        updated.sort_by_key(|o| o.id);

        Order::attach_items(&mut updated, items);
        info!(
            orders = updated.len(),
            events = messages.len(),
            "订单状态批量更新完成"
        );

        Ok(updated)
    }

    /// 分页查询订单
    #[instrument(skip(self))]
    pub async fn get_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        if query.page < 1 {
            return Err(OmsError::Validation("page 必须从 1 开始".to_string()));
        }
        if query.page_size < 1 || query.page_size > MAX_PAGE_SIZE {
            return Err(OmsError::Validation(format!(
                "page_size 必须在 1-{MAX_PAGE_SIZE} 之间"
            )));
        }

        let mut orders = self.store.query_orders(&query).await?;

        if query.include_order_items && !orders.is_empty() {
            let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
            let items = self.store.list_items(&ids).await?;
            Order::attach_items(&mut orders, items);
        }

        Ok(orders)
    }
}
