//! 路由配置

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::post;
use oms_shared::observability::middleware::{http_tracing, request_id};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use crate::handlers;
use crate::repository::{AuditLogRepositoryTrait, OrderStore};
use crate::state::AppState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn order_routes<S, R>() -> Router<AppState<S, R>>
where
    S: OrderStore + 'static,
    R: AuditLogRepositoryTrait + 'static,
{
    Router::new()
        .route("/batch-create", post(handlers::order::batch_create::<S, R>))
        .route(
            "/batch-update-status",
            post(handlers::order::batch_update_status::<S, R>),
        )
        .route("/query", post(handlers::order::query::<S, R>))
}

fn audit_routes<S, R>() -> Router<AppState<S, R>>
where
    S: OrderStore + 'static,
    R: AuditLogRepositoryTrait + 'static,
{
    Router::new().route("/log-order", post(handlers::audit::log_order::<S, R>))
}

/// 构建完整的 API 路由
pub fn api_routes<S, R>(state: AppState<S, R>) -> Router
where
    S: OrderStore + 'static,
    R: AuditLogRepositoryTrait + 'static,
{
    Router::new()
        .nest("/api/v1/order", order_routes())
        .nest("/api/v1/audit", audit_routes())
        .layer(middleware::from_fn(http_tracing))
        .layer(middleware::from_fn(request_id))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
