//! 订单管理服务入口
//!
//! 启动 HTTP API 与 outbox 转发 Worker。

use std::sync::Arc;

use oms_shared::amqp::RabbitMqPublisher;
use oms_shared::config::AppConfig;
use oms_shared::database::Database;
use oms_shared::observability;
use order_service::repository::{AuditLogRepository, OutboxRepository, PgOrderStore};
use order_service::{AppState, AuditLogService, MIGRATOR, OrderService, OutboxRelay, routes};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("order-service")?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        addr = %config.server_addr(),
        "Starting order-service"
    );

    let db = Database::connect(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations(&MIGRATOR).await?;
    }

    // outbox 转发
    let publisher = Arc::new(RabbitMqPublisher::new(config.rabbitmq.clone()));
    let relay = OutboxRelay::new(
        Arc::clone(&publisher),
        Arc::new(OutboxRepository::new(db.pool().clone())),
        &config.outbox,
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay_handle = tokio::spawn(async move { relay.run(shutdown_rx).await });

    let state = AppState::new(
        OrderService::new(Arc::new(PgOrderStore::new(db.pool().clone()))),
        AuditLogService::new(Arc::new(AuditLogRepository::new(db.pool().clone()))),
    );
    let app = routes::api_routes(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 先停 relay，再关闭 broker 连接
    let _ = shutdown_tx.send(true);
    if let Err(e) = relay_handle.await {
        warn!(error = %e, "OutboxRelay 任务异常退出");
    }
    publisher.close().await;
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// 监听 Ctrl+C 与 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
