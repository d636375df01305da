//! 订单事件批处理器
//!
//! 把一批领域事件映射为审计记录，整批一次性转发到审计服务。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use oms_shared::batch::BatchHandler;
use oms_shared::error::{OmsError, Result};
use oms_shared::messages::{
    AuditLogOrder, LogOrdersRequest, OrderCreatedMessage, OrderStatusChangedMessage,
};
use tracing::{debug, info, warn};

use crate::client::AuditForwarder;

/// 新建订单对应的审计状态
pub const CREATED_STATUS: &str = "Created";

/// 每个订单项一条 "Created" 记录
pub fn created_records(batch: &[OrderCreatedMessage]) -> Vec<AuditLogOrder> {
    batch
        .iter()
        .flat_map(|order| {
            order.order_items.iter().map(move |item| AuditLogOrder {
                order_id: order.id,
                order_item_id: item.id,
                customer_id: order.customer_id,
                order_status: CREATED_STATUS.to_string(),
            })
        })
        .collect()
}

pub fn status_changed_records(batch: &[OrderStatusChangedMessage]) -> Vec<AuditLogOrder> {
    batch
        .iter()
        .map(|msg| AuditLogOrder {
            order_id: msg.order_id,
            order_item_id: msg.order_item_id,
            customer_id: msg.customer_id,
            order_status: msg.order_status.clone(),
        })
        .collect()
}

async fn forward<F: AuditForwarder + ?Sized>(forwarder: &F, orders: Vec<AuditLogOrder>) -> Result<()> {
    if orders.is_empty() {
        debug!("批次没有可转发的审计记录，跳过");
        return Ok(());
    }

    let count = orders.len();
    let response = forwarder.log_orders(LogOrdersRequest { orders }).await?;
    info!(sent = count, stored = response.orders.len(), "审计记录转发完成");
    Ok(())
}

// ---------------------------------------------------------------------------
// OrderCreated
// ---------------------------------------------------------------------------

pub struct OrderCreatedBatchHandler<F> {
    forwarder: Arc<F>,
    /// 每 N 个批次注入一次失败，0 表示关闭
    fail_every_nth: u64,
    batches: AtomicU64,
}

impl<F: AuditForwarder> OrderCreatedBatchHandler<F> {
    pub fn new(forwarder: Arc<F>) -> Self {
        Self::with_failure_injection(forwarder, 0)
    }

    pub fn with_failure_injection(forwarder: Arc<F>, fail_every_nth: u64) -> Self {
        Self {
            forwarder,
            fail_every_nth,
            batches: AtomicU64::new(0),
        }
    }

    fn check_injected_failure(&self) -> Result<()> {
        let current = self.batches.fetch_add(1, Ordering::Relaxed) + 1;
        if self.fail_every_nth > 0 && current % self.fail_every_nth == 0 {
            warn!(batch = current, every = self.fail_every_nth, "注入批次失败");
            return Err(OmsError::Internal(format!("第 {current} 个批次注入失败")));
        }
        Ok(())
    }
}

#[async_trait]
impl<F: AuditForwarder> BatchHandler for OrderCreatedBatchHandler<F> {
    type Message = OrderCreatedMessage;

    async fn handle(&self, batch: Vec<OrderCreatedMessage>) -> Result<()> {
        self.check_injected_failure()?;
        forward(self.forwarder.as_ref(), created_records(&batch)).await
    }
}

// ---------------------------------------------------------------------------
// OrderStatusChanged
// ---------------------------------------------------------------------------

pub struct OrderStatusChangedBatchHandler<F> {
    forwarder: Arc<F>,
}

impl<F: AuditForwarder> OrderStatusChangedBatchHandler<F> {
    pub fn new(forwarder: Arc<F>) -> Self {
        Self { forwarder }
    }
}

#[async_trait]
impl<F: AuditForwarder> BatchHandler for OrderStatusChangedBatchHandler<F> {
    type Message = OrderStatusChangedMessage;

    async fn handle(&self, batch: Vec<OrderStatusChangedMessage>) -> Result<()> {
        forward(self.forwarder.as_ref(), status_changed_records(&batch)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockAuditForwarder;
    use oms_shared::messages::LogOrdersResponse;
    use oms_shared::test_utils::{order_created_message, order_status_changed_message};

    fn ok_forwarder(expected_records: usize) -> MockAuditForwarder {
        let mut forwarder = MockAuditForwarder::new();
        forwarder
            .expect_log_orders()
            .withf(move |req| req.orders.len() == expected_records)
            .times(1)
            .returning(|_| Ok(LogOrdersResponse::default()));
        forwarder
    }

    #[test]
    fn test_created_records_one_per_item() {
        let batch = vec![order_created_message(1, 10, 2), order_created_message(2, 20, 1)];
        let records = created_records(&batch);

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.order_status == "Created"));
        assert_eq!(records[0].order_id, 1);
        assert_eq!(records[0].customer_id, 10);
        assert_ne!(records[0].order_item_id, records[1].order_item_id);
        assert_eq!(records[2].order_id, 2);
    }

    #[test]
    fn test_status_changed_records_map_one_to_one() {
        let batch = vec![
            order_status_changed_message(7, 701, "InAssembly"),
            order_status_changed_message(7, 702, "InAssembly"),
        ];
        let records = status_changed_records(&batch);

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].order_item_id, 702);
        assert_eq!(records[1].order_status, "InAssembly");
    }

    #[tokio::test]
    async fn test_created_handler_forwards_whole_batch() {
        let handler = OrderCreatedBatchHandler::new(Arc::new(ok_forwarder(2)));
        handler
            .handle(vec![order_created_message(1, 42, 2)])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_batch_without_items_skips_http() {
        let mut forwarder = MockAuditForwarder::new();
        forwarder.expect_log_orders().never();

        let handler = OrderCreatedBatchHandler::new(Arc::new(forwarder));
        handler
            .handle(vec![order_created_message(1, 42, 0)])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_forwarding_failure_fails_batch() {
        let mut forwarder = MockAuditForwarder::new();
        forwarder.expect_log_orders().returning(|_| {
            Err(OmsError::ForwardingFailed {
                status: Some(503),
                message: "unavailable".into(),
            })
        });

        let handler = OrderStatusChangedBatchHandler::new(Arc::new(forwarder));
        let result = handler
            .handle(vec![order_status_changed_message(1, 11, "Rejected")])
            .await;
        assert!(matches!(
            result,
            Err(OmsError::ForwardingFailed { status: Some(503), .. })
        ));
    }

    #[tokio::test]
    async fn test_failure_injection_every_third_batch() {
        let mut forwarder = MockAuditForwarder::new();
        forwarder
            .expect_log_orders()
            .times(4)
            .returning(|_| Ok(LogOrdersResponse::default()));

        let handler = OrderCreatedBatchHandler::with_failure_injection(Arc::new(forwarder), 3);
        let mut outcomes = Vec::new();
        for i in 0..6 {
            let result = handler.handle(vec![order_created_message(i, 1, 1)]).await;
            outcomes.push(result.is_ok());
        }

        assert_eq!(outcomes, vec![true, true, false, true, true, false]);
    }
}
