//! 审计服务桩
//!
//! 在 127.0.0.1 随机端口上启动 axum 服务，记录收到的请求并按预设状态码响应。

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use oms_shared::messages::{AuditLogOrderRecord, LogOrdersRequest, LogOrdersResponse};
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct StubState {
    pub status: StatusCode,
    pub received: Arc<Mutex<Vec<LogOrdersRequest>>>,
}

impl StubState {
    pub fn requests(&self) -> Vec<LogOrdersRequest> {
        self.received.lock().unwrap().clone()
    }
}

async fn log_order(State(state): State<StubState>, Json(req): Json<LogOrdersRequest>) -> Response {
    state.received.lock().unwrap().push(req.clone());

    if !state.status.is_success() {
        return (state.status, "audit store unavailable").into_response();
    }

    let now = Utc::now();
    let orders = req
        .orders
        .into_iter()
        .map(|o| AuditLogOrderRecord {
            order_id: o.order_id,
            order_item_id: o.order_item_id,
            customer_id: o.customer_id,
            order_status: o.order_status,
            created_at: now,
            updated_at: now,
        })
        .collect();
    (state.status, Json(LogOrdersResponse { orders })).into_response()
}

/// 启动桩服务，返回 base_url 与共享状态
pub async fn spawn_stub(status: StatusCode) -> (String, StubState) {
    let state = StubState {
        status,
        received: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/api/v1/audit/log-order", post(log_order))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), state)
}
