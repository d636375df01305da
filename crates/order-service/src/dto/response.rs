//! 响应 DTO

use serde::{Deserialize, Serialize};

use crate::models::Order;

/// 订单接口统一响应体 `{"orders": [...]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdersResponse {
    pub orders: Vec<Order>,
}

impl From<Vec<Order>> for OrdersResponse {
    fn from(orders: Vec<Order>) -> Self {
        Self { orders }
    }
}
