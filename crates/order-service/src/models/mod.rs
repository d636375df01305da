//! 数据模型

mod audit;
mod enums;
mod order;
mod outbox;

pub use audit::AuditLogRecord;
pub use enums::OrderStatus;
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderQuery, StatusUpdate};
pub use outbox::OutboxEvent;
