//! test_utils 模块的集成测试
//!
//! 验证测试工具在跨 crate 使用时的行为，并用它们驱动批量消费引擎。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use oms_shared::batch::{BatchConfig, BatchConsumer, BatchHandler, BatchOutcome};
use oms_shared::error::{OmsError, Result};
use oms_shared::messages::{OrderCreatedMessage, OrderStatusChangedMessage};
use oms_shared::test_utils::*;

// ==================== 测试配置测试 ====================

#[test]
fn test_database_config_defaults() {
    let config = test_database_config();
    assert!(config.url.starts_with("postgres://"));
    assert_eq!(config.max_connections, 5);
    assert!(config.run_migrations);
}

#[test]
fn test_rabbitmq_config_uses_small_batches() {
    let config = test_rabbitmq_config();
    assert_eq!(config.batch_size, 5);
    assert_eq!(config.batch_timeout(), Duration::from_secs(1));
    assert!(config.uri().starts_with("amqp://"));
}

// ==================== 测试数据生成器测试 ====================

#[test]
fn test_order_created_message_generation() {
    let msg = order_created_message(12, 34, 3);

    assert_eq!(msg.id, 12);
    assert_eq!(msg.customer_id, 34);
    assert_eq!(msg.order_items.len(), 3);
    assert_eq!(
        msg.total_price_cents,
        msg.order_items.iter().map(|i| i.price_cents).sum::<i64>()
    );
    assert!(msg.order_items.iter().all(|i| i.order_id == 12));
}

#[test]
fn test_order_without_items() {
    let msg = order_created_message(1, 1, 0);
    assert!(msg.order_items.is_empty());
    assert_eq!(msg.total_price_cents, 0);
}

#[test]
fn test_status_changed_message_generation() {
    let msg = order_status_changed_message(7, 701, "InAssembly");
    assert_eq!(msg.order_id, 7);
    assert_eq!(msg.order_item_id, 701);
    assert_eq!(msg.order_status, "InAssembly");
}

#[test]
fn test_message_payload_decodes_back() {
    let msg = test_message(9, &order_created_message(5, 6, 2));
    assert_eq!(msg.delivery_tag, 9);
    assert!(!msg.redelivered);

    let decoded: OrderCreatedMessage = msg.deserialize_payload().unwrap();
    assert_eq!(decoded.id, 5);
    assert_eq!(decoded.order_items.len(), 2);
}

#[test]
fn test_message_with_wrong_shape_fails_to_decode() {
    let msg = test_message(1, &serde_json::json!({ "unexpected": true }));
    let result = msg.deserialize_payload::<OrderStatusChangedMessage>();
    assert!(matches!(result, Err(OmsError::Decode(_))));
}

// ==================== 驱动批量消费引擎 ====================

#[derive(Default)]
struct CollectingHandler {
    seen: Mutex<Vec<i64>>,
    fail: bool,
}

#[async_trait]
impl BatchHandler for CollectingHandler {
    type Message = OrderCreatedMessage;

    async fn handle(&self, batch: Vec<OrderCreatedMessage>) -> Result<()> {
        if self.fail {
            return Err(OmsError::Internal("injected".to_string()));
        }
        self.seen.lock().unwrap().extend(batch.iter().map(|m| m.id));
        Ok(())
    }
}

fn consumer(handler: Arc<CollectingHandler>, acker: RecordingAcker) -> BatchConsumer<CollectingHandler, RecordingAcker> {
    BatchConsumer::new(
        "order.created",
        BatchConfig::new(10, Duration::from_millis(50)),
        handler,
        acker,
    )
}

#[tokio::test]
async fn test_successful_flush_acks_highest_tag_once() {
    let handler = Arc::new(CollectingHandler::default());
    let acker = RecordingAcker::default();
    let consumer = consumer(Arc::clone(&handler), acker.clone());

    let batch = vec![
        test_message(3, &order_created_message(1, 1, 1)),
        test_message(4, &order_created_message(2, 1, 1)),
        test_message(5, &order_created_message(3, 1, 1)),
    ];

    assert_eq!(consumer.flush(batch).await.unwrap(), BatchOutcome::Acked);
    assert_eq!(acker.actions(), vec![AckAction::AckUpTo(5)]);
    assert_eq!(*handler.seen.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_failed_flush_rejects_every_message() {
    let handler = Arc::new(CollectingHandler {
        fail: true,
        ..Default::default()
    });
    let acker = RecordingAcker::default();
    let consumer = consumer(handler, acker.clone());

    let batch = vec![
        test_message(1, &order_created_message(1, 1, 1)),
        test_message(2, &order_created_message(2, 1, 1)),
    ];

    assert_eq!(consumer.flush(batch).await.unwrap(), BatchOutcome::Rejected);
    assert_eq!(
        acker.actions(),
        vec![AckAction::Reject(1), AckAction::Reject(2)]
    );
}

#[tokio::test]
async fn test_undecodable_message_rejects_whole_batch() {
    let handler = Arc::new(CollectingHandler::default());
    let acker = RecordingAcker::default();
    let consumer = consumer(Arc::clone(&handler), acker.clone());

    let batch = vec![
        test_message(1, &order_created_message(1, 1, 1)),
        test_message(2, &"not an order"),
    ];

    assert_eq!(consumer.flush(batch).await.unwrap(), BatchOutcome::Rejected);
    assert_eq!(acker.actions().len(), 2);
    assert!(handler.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_ack_failure_surfaces_as_error() {
    let handler = Arc::new(CollectingHandler::default());
    let consumer = consumer(handler, RecordingAcker::failing());

    let batch = vec![test_message(1, &order_created_message(1, 1, 1))];
    assert!(consumer.flush(batch).await.is_err());
}
