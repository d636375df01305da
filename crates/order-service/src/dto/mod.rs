//! 请求与响应 DTO

pub mod request;
pub mod response;

pub use request::{
    AuditLogOrderRequest, BatchCreateOrdersRequest, BatchUpdateStatusRequest,
    CreateOrderItemRequest, CreateOrderRequest, LogOrdersPayload, QueryOrdersRequest,
};
pub use response::OrdersResponse;
