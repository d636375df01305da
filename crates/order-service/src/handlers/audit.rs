//! 审计日志 API 处理器

use axum::Json;
use axum::extract::State;
use oms_shared::messages::LogOrdersResponse;
use validator::Validate;

use crate::dto::LogOrdersPayload;
use crate::error::ApiResult;
use crate::repository::{AuditLogRepositoryTrait, OrderStore};
use crate::state::AppState;

/// 写入审计记录
///
/// POST /api/v1/audit/log-order
pub async fn log_order<S, R>(
    State(state): State<AppState<S, R>>,
    Json(req): Json<LogOrdersPayload>,
) -> ApiResult<Json<LogOrdersResponse>>
where
    S: OrderStore + 'static,
    R: AuditLogRepositoryTrait + 'static,
{
    req.validate()?;

    let records = req.orders.into_iter().map(Into::into).collect();
    let rows = state.audit_service.batch_insert(records).await?;

    Ok(Json(LogOrdersResponse {
        orders: rows.into_iter().map(Into::into).collect(),
    }))
}
