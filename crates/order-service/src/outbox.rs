//! Outbox 转发 Worker
//!
//! 以固定间隔读取 `outbox_events` 中未发布的事件，按 id 顺序发布到 topic 交换机，
//! 发布成功后标记 `published_at`。发布与标记之间进程崩溃会导致重复发布，
//! 消费端不去重，重复事件会在审计表中产生重复记录。
//!
//! 同一时刻只应运行一个 relay 实例。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use oms_shared::amqp::EventPublisher;
use oms_shared::config::OutboxConfig;
use oms_shared::error::Result;
use oms_shared::messages::OutgoingMessage;
use oms_shared::observability::metrics as oms_metrics;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::repository::OutboxRepositoryTrait;

pub struct OutboxRelay<P, R> {
    publisher: Arc<P>,
    repo: Arc<R>,
    poll_interval: Duration,
    batch_size: i64,
}

impl<P: EventPublisher, R: OutboxRepositoryTrait> OutboxRelay<P, R> {
    pub fn new(publisher: Arc<P>, repo: Arc<R>, config: &OutboxConfig) -> Self {
        Self {
            publisher,
            repo,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            batch_size: config.batch_size.max(1),
        }
    }

    /// 转发一批待发布事件，返回成功发布的条数
    ///
    /// 发布失败时整批不标记，下一轮从同一位置重试。
    pub async fn relay_once(&self) -> Result<usize> {
        let pending = self.repo.fetch_pending(self.batch_size).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let messages: Vec<OutgoingMessage> = pending.iter().map(|e| e.to_message()).collect();
        self.publisher.publish(&messages).await?;

        let ids: Vec<i64> = pending.iter().map(|e| e.id).collect();
        let marked = self.repo.mark_published(&ids, Utc::now()).await?;

        oms_metrics::record_outbox_published(messages.len());
        debug!(published = messages.len(), marked, "outbox 事件已转发");

        Ok(messages.len())
    }

    /// 主循环，直到收到关闭信号
    ///
    /// 一轮处理满一整批时立即进入下一轮，不等待轮询间隔。
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval = ?self.poll_interval,
            batch_size = self.batch_size,
            "OutboxRelay 已启动"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            loop {
                match self.relay_once().await {
                    Ok(n) if n as i64 >= self.batch_size => continue,
                    Ok(_) => break,
                    Err(e) => {
                        error!(error = %e, "转发 outbox 事件失败，等待下一轮重试");
                        break;
                    }
                }
            }

            if *shutdown.borrow() {
                break;
            }
        }

        info!("OutboxRelay 已停止");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutboxEvent;
    use crate::repository::MockOutboxRepositoryTrait;
    use async_trait::async_trait;
    use oms_shared::error::OmsError;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<OutgoingMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, messages: &[OutgoingMessage]) -> Result<()> {
            if self.fail {
                return Err(OmsError::Amqp("connection refused".into()));
            }
            self.published.lock().unwrap().extend_from_slice(messages);
            Ok(())
        }
    }

    fn event(id: i64) -> OutboxEvent {
        OutboxEvent {
            id,
            event_id: Uuid::now_v7(),
            routing_key: "order.created".into(),
            payload: serde_json::json!({ "id": id }),
            created_at: Utc::now(),
            published_at: None,
        }
    }

    fn config() -> OutboxConfig {
        OutboxConfig {
            poll_interval_ms: 10,
            batch_size: 100,
        }
    }

    #[tokio::test]
    async fn test_relay_once_publishes_then_marks() {
        let mut repo = MockOutboxRepositoryTrait::new();
        repo.expect_fetch_pending()
            .returning(|_| Ok(vec![event(1), event(2)]));
        repo.expect_mark_published()
            .withf(|ids, _| ids.to_vec() == vec![1, 2])
            .times(1)
            .returning(|ids, _| Ok(ids.len() as u64));

        let publisher = Arc::new(RecordingPublisher::default());
        let relay = OutboxRelay::new(Arc::clone(&publisher), Arc::new(repo), &config());

        assert_eq!(relay.relay_once().await.unwrap(), 2);
        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].payload["id"], 1);
    }

    #[tokio::test]
    async fn test_publish_failure_leaves_events_pending() {
        let mut repo = MockOutboxRepositoryTrait::new();
        repo.expect_fetch_pending().returning(|_| Ok(vec![event(1)]));
        repo.expect_mark_published().never();

        let publisher = Arc::new(RecordingPublisher {
            fail: true,
            ..Default::default()
        });
        let relay = OutboxRelay::new(publisher, Arc::new(repo), &config());

        assert!(matches!(relay.relay_once().await, Err(OmsError::Amqp(_))));
    }

    #[tokio::test]
    async fn test_nothing_pending_skips_publisher() {
        let mut repo = MockOutboxRepositoryTrait::new();
        repo.expect_fetch_pending().returning(|_| Ok(vec![]));
        repo.expect_mark_published().never();

        let publisher = Arc::new(RecordingPublisher {
            fail: true,
            ..Default::default()
        });
        let relay = OutboxRelay::new(publisher, Arc::new(repo), &config());

        assert_eq!(relay.relay_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut repo = MockOutboxRepositoryTrait::new();
        repo.expect_fetch_pending().returning(|_| Ok(vec![]));

        let relay = OutboxRelay::new(
            Arc::new(RecordingPublisher::default()),
            Arc::new(repo),
            &config(),
        );
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { relay.run(rx).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("relay 未在超时内退出")
            .unwrap();
    }
}
