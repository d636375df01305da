//! 订单 API 处理器

use axum::Json;
use axum::extract::State;
use tracing::info;
use validator::Validate;

use crate::dto::{BatchCreateOrdersRequest, BatchUpdateStatusRequest, OrdersResponse, QueryOrdersRequest};
use crate::error::ApiResult;
use crate::repository::{AuditLogRepositoryTrait, OrderStore};
use crate::state::AppState;

/// 批量创建订单
///
/// POST /api/v1/order/batch-create
pub async fn batch_create<S, R>(
    State(state): State<AppState<S, R>>,
    Json(req): Json<BatchCreateOrdersRequest>,
) -> ApiResult<Json<OrdersResponse>>
where
    S: OrderStore + 'static,
    R: AuditLogRepositoryTrait + 'static,
{
    req.validate()?;

    let orders = req.orders.into_iter().map(Into::into).collect();
    let created = state.order_service.batch_insert(orders).await?;

    info!(count = created.len(), "订单已创建");
    Ok(Json(created.into()))
}

/// 批量更新订单状态
///
/// POST /api/v1/order/batch-update-status
pub async fn batch_update_status<S, R>(
    State(state): State<AppState<S, R>>,
    Json(req): Json<BatchUpdateStatusRequest>,
) -> ApiResult<Json<OrdersResponse>>
where
    S: OrderStore + 'static,
    R: AuditLogRepositoryTrait + 'static,
{
    req.validate()?;

    let updated = state
        .order_service
        .batch_update_status(vec![req.into()])
        .await?;

    Ok(Json(updated.into()))
}

/// 查询订单
///
/// POST /api/v1/order/query
pub async fn query<S, R>(
    State(state): State<AppState<S, R>>,
    Json(req): Json<QueryOrdersRequest>,
) -> ApiResult<Json<OrdersResponse>>
where
    S: OrderStore + 'static,
    R: AuditLogRepositoryTrait + 'static,
{
    req.validate()?;

    let orders = state.order_service.get_orders(req.into()).await?;
    Ok(Json(orders.into()))
}
