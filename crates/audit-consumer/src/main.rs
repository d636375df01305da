//! 审计消费者入口

use std::sync::Arc;

use audit_consumer::{OmsClient, OrderCreatedBatchHandler, OrderStatusChangedBatchHandler, QueueConsumer};
use oms_shared::config::AppConfig;
use oms_shared::observability;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("audit-consumer")?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    let rabbitmq = config.rabbitmq.clone();
    info!(
        host = %rabbitmq.host,
        exchange = %rabbitmq.exchange,
        batch_size = rabbitmq.batch_size,
        audit_url = %config.audit_client.base_url,
        "Starting audit-consumer"
    );

    let client = Arc::new(OmsClient::new(&config.audit_client)?);

    if rabbitmq.fail_every_nth_batch > 0 {
        warn!(every = rabbitmq.fail_every_nth_batch, "已开启批次失败注入");
    }
    let created = QueueConsumer::new(
        "audit-order-created",
        rabbitmq.order_created_queue.clone(),
        rabbitmq.clone(),
        Arc::new(OrderCreatedBatchHandler::with_failure_injection(
            Arc::clone(&client),
            rabbitmq.fail_every_nth_batch,
        )),
    );
    let status_changed = QueueConsumer::new(
        "audit-order-status-changed",
        rabbitmq.order_status_changed_queue.clone(),
        rabbitmq.clone(),
        Arc::new(OrderStatusChangedBatchHandler::new(Arc::clone(&client))),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = vec![
        tokio::spawn({
            let rx = shutdown_rx.clone();
            async move { created.run(rx).await }
        }),
        tokio::spawn(async move { status_changed.run(shutdown_rx).await }),
    ];

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    let grace = rabbitmq.shutdown_grace();
    if tokio::time::timeout(grace, futures::future::join_all(handles))
        .await
        .is_err()
    {
        warn!(grace_seconds = grace.as_secs(), "消费者未在宽限期内退出");
    }

    info!("audit-consumer shutdown complete");
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
