//! 仓储 Trait 定义
//!
//! 服务层依赖抽象而非具体实现，支持 mock 与内存实现测试

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oms_shared::error::Result;
use oms_shared::messages::{AuditLogOrder, OutgoingMessage};

use crate::models::{AuditLogRecord, NewOrder, NewOrderItem, Order, OrderItem, OrderQuery, OrderStatus, OutboxEvent};

/// 订单存储
#[async_trait]
pub trait OrderStore: Send + Sync {
    type Tx: OrderTransaction;

    /// 开启事务，事务对象 drop 而未提交时回滚
    async fn begin(&self) -> Result<Self::Tx>;

    /// 按条件分页查询订单（不含订单项）
    async fn query_orders(&self, query: &OrderQuery) -> Result<Vec<Order>>;

    async fn list_items(&self, order_ids: &[i64]) -> Result<Vec<OrderItem>>;
}

/// 订单事务内的写操作
#[async_trait]
pub trait OrderTransaction: Send {
    /// 批量插入订单，状态固定为 Created，返回结果按插入顺序排列
    async fn insert_orders(&mut self, orders: &[NewOrder], now: DateTime<Utc>) -> Result<Vec<Order>>;

    /// 批量插入订单项，元组第一项为所属订单 ID
    async fn insert_items(
        &mut self,
        items: &[(i64, NewOrderItem)],
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderItem>>;

    /// 加锁读取订单，用于更新前校验
    async fn lock_orders(&mut self, ids: &[i64]) -> Result<Vec<Order>>;

    async fn update_status(
        &mut self,
        ids: &[i64],
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>>;

    async fn list_items(&mut self, order_ids: &[i64]) -> Result<Vec<OrderItem>>;

    /// 把待发布事件写入 outbox
    async fn enqueue_events(&mut self, messages: &[OutgoingMessage], now: DateTime<Utc>) -> Result<()>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// 审计日志仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLogRepositoryTrait: Send + Sync {
    /// 单事务批量插入，不去重
    async fn batch_insert(
        &self,
        records: &[AuditLogOrder],
        now: DateTime<Utc>,
    ) -> Result<Vec<AuditLogRecord>>;
}

/// Outbox 仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutboxRepositoryTrait: Send + Sync {
    /// 按 id 顺序读取未发布事件
    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxEvent>>;

    async fn mark_published(&self, ids: &[i64], now: DateTime<Utc>) -> Result<u64>;
}
