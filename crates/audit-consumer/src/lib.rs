//! 审计消费者服务
//!
//! 从 RabbitMQ 批量消费订单事件，映射为审计记录后转发到订单服务的审计接口。
//! 整批成功才累积确认，任何失败都整批拒绝并进入死信队列。

pub mod client;
pub mod consumer;
pub mod error;
pub mod handlers;

pub use client::{AuditForwarder, OmsClient};
pub use consumer::QueueConsumer;
pub use error::ConsumerError;
pub use handlers::{OrderCreatedBatchHandler, OrderStatusChangedBatchHandler};
