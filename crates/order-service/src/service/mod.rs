//! 服务层
//!
//! - `order_service`: 订单创建、状态流转与查询，负责事务边界与事件入队
//! - `audit_log_service`: 审计日志写入

pub mod audit_log_service;
pub mod order_service;

pub use audit_log_service::AuditLogService;
pub use order_service::OrderService;
