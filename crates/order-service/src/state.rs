//! 应用状态定义

use std::sync::Arc;

use crate::service::{AuditLogService, OrderService};

/// Axum 共享状态
///
/// 以存储实现为泛型参数，生产环境使用 PostgreSQL 仓储，测试使用内存存储。
pub struct AppState<S, R> {
    pub order_service: Arc<OrderService<S>>,
    pub audit_service: Arc<AuditLogService<R>>,
}

impl<S, R> AppState<S, R> {
    pub fn new(order_service: OrderService<S>, audit_service: AuditLogService<R>) -> Self {
        Self {
            order_service: Arc::new(order_service),
            audit_service: Arc::new(audit_service),
        }
    }
}

impl<S, R> Clone for AppState<S, R> {
    fn clone(&self) -> Self {
        Self {
            order_service: Arc::clone(&self.order_service),
            audit_service: Arc::clone(&self.audit_service),
        }
    }
}
