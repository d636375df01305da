//! 订单管理服务
//!
//! ## 模块结构
//!
//! - `models`: 订单、订单项、审计记录、outbox 事件
//! - `state_machine`: 订单状态迁移规则
//! - `repository`: PostgreSQL 与内存两套存储实现
//! - `service`: 订单与审计日志业务逻辑，负责事务边界
//! - `outbox`: 把已提交的领域事件转发到 RabbitMQ
//! - `dto` / `handlers` / `routes` / `state` / `error`: HTTP 接口层

pub mod dto;
pub mod error;
pub mod handlers;
pub mod models;
pub mod outbox;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;
pub mod state_machine;

pub use error::ApiError;
pub use models::{Order, OrderItem, OrderStatus};
pub use outbox::OutboxRelay;
pub use service::{AuditLogService, OrderService};
pub use state::AppState;

/// 内嵌的数据库迁移脚本
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
