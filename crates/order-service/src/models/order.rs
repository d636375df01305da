//! 订单与订单项模型

use chrono::{DateTime, Utc};
use oms_shared::messages::{OrderCreatedMessage, OrderItemMessage, OrderStatusChangedMessage};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::OrderStatus;

/// 订单
///
/// `id` 由数据库生成；`status` 与时间戳只由服务层设置，不接受客户端传入。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub delivery_address: String,
    pub total_price_cents: i64,
    pub total_price_currency: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
}

/// 订单项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub product_title: String,
    pub product_url: String,
    pub price_cents: i64,
    pub price_currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 待创建的订单
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: i64,
    pub delivery_address: String,
    pub total_price_cents: i64,
    pub total_price_currency: String,
    pub order_items: Vec<NewOrderItem>,
}

/// 待创建的订单项，order_id 在订单落库后才确定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i32,
    pub product_title: String,
    pub product_url: String,
    pub price_cents: i64,
    pub price_currency: String,
}

/// 一组订单的目标状态，状态标签在服务层解析
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub order_ids: Vec<i64>,
    pub new_status: String,
}

/// 订单查询条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    pub ids: Option<Vec<i64>>,
    pub customer_ids: Option<Vec<i64>>,
    /// 从 1 开始
    pub page: i64,
    pub page_size: i64,
    pub include_order_items: bool,
}

impl OrderQuery {
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    /// 超大页码饱和到 `i64::MAX`，查询结果为空
    pub fn offset(&self) -> i64 {
        self.page
            .saturating_sub(1)
            .max(0)
            .saturating_mul(self.page_size.max(0))
    }
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            ids: None,
            customer_ids: None,
            page: 1,
            page_size: 100,
            include_order_items: false,
        }
    }
}

impl Order {
    /// 按 order_id 把订单项挂到对应订单上
    pub fn attach_items(orders: &mut [Order], items: Vec<OrderItem>) {
        for order in orders.iter_mut() {
            order
                .order_items
                .extend(items.iter().filter(|i| i.order_id == order.id).cloned());
        }
    }

    /// 构造订单创建事件，只携带本订单自己的订单项
    pub fn created_message(&self) -> OrderCreatedMessage {
        OrderCreatedMessage {
            id: self.id,
            customer_id: self.customer_id,
            delivery_address: self.delivery_address.clone(),
            total_price_cents: self.total_price_cents,
            total_price_currency: self.total_price_currency.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            order_items: self
                .order_items
                .iter()
                .filter(|item| item.order_id == self.id)
                .map(OrderItem::to_message)
                .collect(),
        }
    }

    /// 构造状态变更事件，每个订单项一条
    pub fn status_changed_messages(&self, items: &[OrderItem]) -> Vec<OrderStatusChangedMessage> {
        items
            .iter()
            .filter(|item| item.order_id == self.id)
            .map(|item| OrderStatusChangedMessage {
                order_id: self.id,
                order_item_id: item.id,
                customer_id: self.customer_id,
                order_status: self.status.to_string(),
                created_at: self.created_at,
                updated_at: self.updated_at,
            })
            .collect()
    }
}

impl OrderItem {
    pub fn to_message(&self) -> OrderItemMessage {
        OrderItemMessage {
            id: self.id,
            order_id: self.order_id,
            product_id: self.product_id,
            quantity: self.quantity,
            product_title: self.product_title.clone(),
            product_url: self.product_url.clone(),
            price_cents: self.price_cents,
            price_currency: self.price_currency.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
