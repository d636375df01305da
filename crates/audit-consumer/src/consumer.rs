//! 队列消费者
//!
//! 每个队列独占一条连接和 channel，把投递流交给批量消费引擎。
//! 引擎因连接中断退出后，等待固定间隔重新建立连接；收到关闭信号后
//! 关闭 channel 与连接，未确认的消息由 broker 重新投递。

use std::sync::Arc;

use lapin::options::{BasicConsumeOptions, BasicQosOptions};
use lapin::types::FieldTable;
use oms_shared::amqp::{ChannelAcker, close_quietly, connect_with_retry, declare_topology, delivery_stream};
use oms_shared::batch::{BatchConfig, BatchConsumer, BatchHandler, ConsumerExit};
use oms_shared::config::RabbitMqConfig;
use oms_shared::error::Result;
use tokio::sync::watch;
use tracing::{error, info, warn};

pub struct QueueConsumer<H> {
    name: String,
    queue: String,
    config: RabbitMqConfig,
    handler: Arc<H>,
}

impl<H: BatchHandler + 'static> QueueConsumer<H> {
    pub fn new(
        name: impl Into<String>,
        queue: impl Into<String>,
        config: RabbitMqConfig,
        handler: Arc<H>,
    ) -> Self {
        Self {
            name: name.into(),
            queue: queue.into(),
            config,
            handler,
        }
    }

    fn batch_config(&self) -> BatchConfig {
        BatchConfig::new(self.config.batch_size, self.config.batch_timeout())
    }

    /// 消费主循环，直到收到关闭信号
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(consumer = %self.name, queue = %self.queue, "队列消费者已启动");

        while !*shutdown.borrow() {
            match self.consume_once(&mut shutdown).await {
                Ok(ConsumerExit::Shutdown) => break,
                Ok(ConsumerExit::ChannelLost(reason)) => {
                    warn!(consumer = %self.name, reason = %reason, "消费 channel 中断，准备重连");
                }
                Err(e) => {
                    error!(consumer = %self.name, error = %e, "建立消费 channel 失败");
                }
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.reconnect_interval()) => {}
            }
        }

        info!(consumer = %self.name, "队列消费者已停止");
    }

    async fn consume_once(&self, shutdown: &mut watch::Receiver<bool>) -> Result<ConsumerExit> {
        let connection = connect_with_retry(&self.config).await?;
        let channel = connection.create_channel().await?;
        declare_topology(&channel, &self.config).await?;

        let batch = self.batch_config();
        // 预取数量等于批大小，保证一个完整批次可以缓冲在本地
        let prefetch = u16::try_from(batch.batch_size).unwrap_or(u16::MAX);
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;

        let consumer = channel
            .basic_consume(
                &self.queue,
                &self.name,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(
            consumer = %self.name,
            queue = %self.queue,
            prefetch,
            "已订阅队列"
        );

        let engine = BatchConsumer::new(
            self.name.clone(),
            batch,
            Arc::clone(&self.handler),
            ChannelAcker::new(channel.clone()),
        );
        let exit = engine.run(delivery_stream(consumer), shutdown).await;

        close_quietly(&channel, &connection, self.config.shutdown_grace()).await;
        Ok(exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms_shared::test_utils::test_rabbitmq_config;
    use std::time::Duration;

    struct NoopHandler;

    #[async_trait::async_trait]
    impl BatchHandler for NoopHandler {
        type Message = serde_json::Value;

        async fn handle(&self, _batch: Vec<serde_json::Value>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_batch_config_follows_rabbitmq_settings() {
        let config = RabbitMqConfig {
            batch_size: 0,
            batch_timeout_seconds: 3,
            ..Default::default()
        };
        let consumer = QueueConsumer::new("c", "q", config, Arc::new(NoopHandler));
        let batch = consumer.batch_config();
        assert_eq!(batch.batch_size, 1);
        assert_eq!(batch.batch_timeout, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_run_returns_immediately_when_already_shut_down() {
        let consumer = QueueConsumer::new(
            "c",
            "q",
            test_rabbitmq_config(),
            Arc::new(NoopHandler),
        );
        let (_tx, rx) = watch::channel(true);

        tokio::time::timeout(Duration::from_secs(1), consumer.run(rx))
            .await
            .expect("已关闭时不应尝试连接");
    }

    #[tokio::test]
    #[ignore] // 需要 RabbitMQ
    async fn test_reconnects_until_shutdown() {
        let consumer = Arc::new(QueueConsumer::new(
            "audit-test",
            "oms.order.created",
            test_rabbitmq_config(),
            Arc::new(NoopHandler),
        ));
        let (tx, rx) = watch::channel(false);

        let task = {
            let consumer = Arc::clone(&consumer);
            tokio::spawn(async move { consumer.run(rx).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .expect("消费者未在超时内退出")
            .unwrap();
    }
}
