//! Prometheus 指标
//!
//! 业务代码只调用本模块的 `record_*` 函数；recorder 未安装时这些调用是空操作。
//! 导出端点运行在独立端口上，与业务 HTTP 服务分离。

use std::net::SocketAddr;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::ObservabilityConfig;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// 导出服务器守卫，drop 时停止服务器
pub struct MetricsHandle {
    server: JoinHandle<()>,
}

impl Drop for MetricsHandle {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// 安装全局 recorder 并在 `metrics_port` 上暴露 `/metrics` 与 `/health`
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("安装 Prometheus recorder 失败")?;
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    describe_metrics();
    metrics::counter!("service_starts_total", "service" => config.service_name.clone())
        .increment(1);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("指标端口 {addr} 绑定失败"))?;
    info!(%addr, "指标服务器已启动");

    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "指标服务器异常退出");
        }
    });

    Ok(MetricsHandle { server })
}

fn describe_metrics() {
    metrics::describe_counter!("http_requests_total", "HTTP requests by method, route and status");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        metrics::Unit::Seconds,
        "HTTP request latency"
    );
    metrics::describe_counter!("orders_created_total", "Orders persisted by batch-create");
    metrics::describe_counter!(
        "order_status_updates_total",
        "Orders moved to a new status, labelled by target status"
    );
    metrics::describe_counter!(
        "outbox_events_published_total",
        "Outbox events confirmed by the broker"
    );
    metrics::describe_counter!("consumer_batches_total", "Consumed batches by queue and outcome");
    metrics::describe_counter!("consumer_messages_total", "Consumed messages by queue and outcome");
    metrics::describe_histogram!("consumer_batch_size", "Messages per flushed batch");
    metrics::describe_counter!(
        "audit_records_forwarded_total",
        "Audit records sent to the audit endpoint by result"
    );
}

/// 已安装的 handle，未调用 [`init`] 时为 `None`
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

pub fn record_http_request(method: &str, route: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", route.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_request_duration_seconds", &labels).record(duration_secs);
}

pub fn record_orders_created(count: usize) {
    metrics::counter!("orders_created_total").increment(count as u64);
}

pub fn record_status_updates(target: &str, count: usize) {
    metrics::counter!("order_status_updates_total", "target" => target.to_string())
        .increment(count as u64);
}

pub fn record_outbox_published(count: usize) {
    metrics::counter!("outbox_events_published_total").increment(count as u64);
}

/// `status` 取值：success、rejected、transport_error、decode_error
pub fn record_audit_forwarded(status: &str, count: usize) {
    metrics::counter!("audit_records_forwarded_total", "status" => status.to_string())
        .increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_without_recorder() {
        record_http_request("POST", "/api/v1/order/batch-create", 200, 0.1);
        record_orders_created(3);
        record_status_updates("InAssembly", 2);
        record_outbox_published(5);
        record_audit_forwarded("success", 4);
        assert!(get_handle().is_none());
    }
}
