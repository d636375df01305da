//! 仓储层
//!
//! 订单写入通过 `OrderStore`/`OrderTransaction` 两层抽象暴露事务边界，
//! 服务层在同一事务内完成订单、订单项与 outbox 事件的写入。

pub mod memory;
mod audit_log_repo;
mod order_repo;
mod outbox_repo;
mod traits;

pub use audit_log_repo::AuditLogRepository;
pub use memory::InMemoryOrderStore;
pub use order_repo::{PgOrderStore, PgOrderTransaction};
pub use outbox_repo::OutboxRepository;
pub use traits::*;
