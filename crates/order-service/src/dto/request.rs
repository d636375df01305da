//! 请求 DTO 与参数校验

use std::str::FromStr;

use oms_shared::messages::AuditLogOrder;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::{NewOrder, NewOrderItem, OrderQuery, OrderStatus, StatusUpdate};
use crate::service::order_service::MAX_PAGE_SIZE;

/// 单次请求的最大订单数
pub const MAX_BATCH_ORDERS: u64 = 1000;

fn positive_ids(ids: &[i64]) -> Result<(), ValidationError> {
    if ids.iter().all(|id| *id > 0) {
        Ok(())
    } else {
        Err(ValidationError::new("positive_ids").with_message("ID 必须大于 0".into()))
    }
}

/// 忽略大小写
fn known_status(value: &str) -> Result<(), ValidationError> {
    OrderStatus::from_str(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("order_status").with_message("不支持的订单状态".into()))
}

/// 区分大小写，必须是标准标签
fn exact_status(value: &str) -> Result<(), ValidationError> {
    match OrderStatus::from_label(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("order_status").with_message("不支持的订单状态".into())),
    }
}

// ---------------------------------------------------------------------------
// 创建订单
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderItemRequest {
    #[validate(range(min = 1, message = "product_id 必须大于 0"))]
    pub product_id: i64,
    #[validate(range(min = 1, message = "数量必须大于 0"))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 255, message = "商品名称长度必须在1-255个字符之间"))]
    pub product_title: String,
    #[validate(length(max = 2048, message = "商品链接过长"))]
    #[serde(default)]
    pub product_url: String,
    #[validate(range(min = 0, message = "价格不能为负"))]
    pub price_cents: i64,
    #[validate(length(equal = 3, message = "币种必须是 3 位代码"))]
    pub price_currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(range(min = 1, message = "customer_id 必须大于 0"))]
    pub customer_id: i64,
    #[validate(length(min = 1, max = 1000, message = "配送地址长度必须在1-1000个字符之间"))]
    pub delivery_address: String,
    #[validate(range(min = 0, message = "订单总价不能为负"))]
    pub total_price_cents: i64,
    #[validate(length(equal = 3, message = "币种必须是 3 位代码"))]
    pub total_price_currency: String,
    #[validate(nested)]
    #[serde(default)]
    pub order_items: Vec<CreateOrderItemRequest>,
}

/// POST /api/v1/order/batch-create
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BatchCreateOrdersRequest {
    #[validate(length(min = 1, max = MAX_BATCH_ORDERS, message = "订单数量必须在1-1000之间"), nested)]
    pub orders: Vec<CreateOrderRequest>,
}

impl From<CreateOrderItemRequest> for NewOrderItem {
    fn from(req: CreateOrderItemRequest) -> Self {
        Self {
            product_id: req.product_id,
            quantity: req.quantity,
            product_title: req.product_title,
            product_url: req.product_url,
            price_cents: req.price_cents,
            price_currency: req.price_currency,
        }
    }
}

impl From<CreateOrderRequest> for NewOrder {
    fn from(req: CreateOrderRequest) -> Self {
        Self {
            customer_id: req.customer_id,
            delivery_address: req.delivery_address,
            total_price_cents: req.total_price_cents,
            total_price_currency: req.total_price_currency,
            order_items: req.order_items.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// 更新状态
// ---------------------------------------------------------------------------

/// POST /api/v1/order/batch-update-status
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BatchUpdateStatusRequest {
    #[validate(
        length(min = 1, message = "order_ids 不能为空"),
        custom(function = "positive_ids")
    )]
    pub order_ids: Vec<i64>,
    #[validate(custom(function = "known_status"))]
    pub new_status: String,
}

impl From<BatchUpdateStatusRequest> for StatusUpdate {
    fn from(req: BatchUpdateStatusRequest) -> Self {
        Self {
            order_ids: req.order_ids,
            new_status: req.new_status,
        }
    }
}

// ---------------------------------------------------------------------------
// 查询
// ---------------------------------------------------------------------------

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    100
}

/// POST /api/v1/order/query
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QueryOrdersRequest {
    #[serde(default)]
    pub ids: Option<Vec<i64>>,
    #[serde(default)]
    pub customer_ids: Option<Vec<i64>>,
    #[validate(range(min = 1, message = "page 必须从 1 开始"))]
    #[serde(default = "default_page")]
    pub page: i64,
    #[validate(range(min = 1, max = MAX_PAGE_SIZE, message = "page_size 超出范围"))]
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub include_order_items: bool,
}

impl From<QueryOrdersRequest> for OrderQuery {
    fn from(req: QueryOrdersRequest) -> Self {
        Self {
            ids: req.ids,
            customer_ids: req.customer_ids,
            page: req.page,
            page_size: req.page_size,
            include_order_items: req.include_order_items,
        }
    }
}

// ---------------------------------------------------------------------------
// 审计日志
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuditLogOrderRequest {
    #[validate(range(min = 1, message = "order_id 必须大于 0"))]
    pub order_id: i64,
    #[validate(range(min = 1, message = "order_item_id 必须大于 0"))]
    pub order_item_id: i64,
    #[validate(range(min = 1, message = "customer_id 必须大于 0"))]
    pub customer_id: i64,
    #[validate(custom(function = "exact_status"))]
    pub order_status: String,
}

/// POST /api/v1/audit/log-order
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LogOrdersPayload {
    #[validate(length(min = 1, message = "orders 不能为空"), nested)]
    pub orders: Vec<AuditLogOrderRequest>,
}

impl From<AuditLogOrderRequest> for AuditLogOrder {
    fn from(req: AuditLogOrderRequest) -> Self {
        Self {
            order_id: req.order_id,
            order_item_id: req.order_item_id,
            customer_id: req.customer_id,
            order_status: req.order_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_json() -> serde_json::Value {
        json!({
            "customer_id": 1,
            "delivery_address": "Moscow",
            "total_price_cents": 1000,
            "total_price_currency": "RUB",
            "order_items": [{
                "product_id": 10,
                "quantity": 2,
                "product_title": "Book",
                "product_url": "https://shop.example/book",
                "price_cents": 500,
                "price_currency": "RUB"
            }]
        })
    }

    #[test]
    fn test_batch_create_valid() {
        let req: BatchCreateOrdersRequest =
            serde_json::from_value(json!({ "orders": [order_json()] })).unwrap();
        assert!(req.validate().is_ok());

        let new: NewOrder = req.orders[0].clone().into();
        assert_eq!(new.order_items.len(), 1);
        assert_eq!(new.order_items[0].quantity, 2);
    }

    #[test]
    fn test_batch_create_rejects_empty_and_bad_items() {
        let empty: BatchCreateOrdersRequest =
            serde_json::from_value(json!({ "orders": [] })).unwrap();
        assert!(empty.validate().is_err());

        let mut bad = order_json();
        bad["order_items"][0]["quantity"] = json!(0);
        let req: BatchCreateOrdersRequest =
            serde_json::from_value(json!({ "orders": [bad] })).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_update_status_accepts_any_case() {
        let req: BatchUpdateStatusRequest =
            serde_json::from_value(json!({ "order_ids": [7], "new_status": "inassembly" })).unwrap();
        assert!(req.validate().is_ok());

        let unknown: BatchUpdateStatusRequest =
            serde_json::from_value(json!({ "order_ids": [7], "new_status": "Shipped" })).unwrap();
        assert!(unknown.validate().is_err());

        let no_ids: BatchUpdateStatusRequest =
            serde_json::from_value(json!({ "order_ids": [], "new_status": "Rejected" })).unwrap();
        assert!(no_ids.validate().is_err());

        let zero_id: BatchUpdateStatusRequest =
            serde_json::from_value(json!({ "order_ids": [0], "new_status": "Rejected" })).unwrap();
        assert!(zero_id.validate().is_err());
    }

    #[test]
    fn test_query_defaults_and_bounds() {
        let req: QueryOrdersRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, 100);

        let too_big: QueryOrdersRequest =
            serde_json::from_value(json!({ "page_size": MAX_PAGE_SIZE + 1 })).unwrap();
        assert!(too_big.validate().is_err());
    }

    #[test]
    fn test_audit_log_requires_exact_status() {
        let ok: LogOrdersPayload = serde_json::from_value(json!({
            "orders": [{ "order_id": 1, "order_item_id": 2, "customer_id": 3, "order_status": "Created" }]
        }))
        .unwrap();
        assert!(ok.validate().is_ok());

        let lower: LogOrdersPayload = serde_json::from_value(json!({
            "orders": [{ "order_id": 1, "order_item_id": 2, "customer_id": 3, "order_status": "created" }]
        }))
        .unwrap();
        assert!(lower.validate().is_err());

        let zero: LogOrdersPayload = serde_json::from_value(json!({
            "orders": [{ "order_id": 0, "order_item_id": 2, "customer_id": 3, "order_status": "Created" }]
        }))
        .unwrap();
        assert!(zero.validate().is_err());

        let empty: LogOrdersPayload = serde_json::from_value(json!({ "orders": [] })).unwrap();
        assert!(empty.validate().is_err());
    }
}
