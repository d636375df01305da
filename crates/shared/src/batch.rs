//! 批量消费引擎
//!
//! 从消息流中累积有界批次，整批交给处理器，并按处理结果统一确认：
//!
//! - 累积：批次达到 `batch_size`，或自首条消息起经过 `batch_timeout`，两者先到即刷出
//! - 成功：对批内最大 delivery tag 做一次累积确认（multiple = true）
//! - 失败：逐条 nack 且不重新入队，由队列的死信配置决定去向
//! - 同一时刻只有一个批次在处理，上一批确认完成后才开始下一批累积
//! - 关闭：停止累积，已开始的刷出会执行完毕，未刷出的消息不确认，
//!   channel 关闭后由 broker 重新投递

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::amqp::{ConsumerMessage, DeliveryAcker};
use crate::error::Result;

/// 批次参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub batch_timeout: Duration,
}

impl BatchConfig {
    pub fn new(batch_size: usize, batch_timeout: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batch_timeout,
        }
    }
}

/// 批处理器
///
/// 引擎负责把原始负载解码为 `Message`，解码失败与处理失败同等对待：整批拒绝。
#[async_trait]
pub trait BatchHandler: Send + Sync {
    type Message: DeserializeOwned + Send;

    async fn handle(&self, batch: Vec<Self::Message>) -> Result<()>;
}

/// 单个批次的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Acked,
    Rejected,
}

impl BatchOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Acked => "acked",
            Self::Rejected => "rejected",
        }
    }
}

/// 消费循环退出原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerExit {
    /// 收到关闭信号
    Shutdown,
    /// 消息流结束、出错或确认失败，需要重建连接
    ChannelLost(String),
}

/// 通用批量消费者
pub struct BatchConsumer<H, A> {
    name: String,
    config: BatchConfig,
    handler: Arc<H>,
    acker: A,
}

impl<H, A> BatchConsumer<H, A>
where
    H: BatchHandler,
    A: DeliveryAcker,
{
    pub fn new(name: impl Into<String>, config: BatchConfig, handler: Arc<H>, acker: A) -> Self {
        Self {
            name: name.into(),
            config: BatchConfig::new(config.batch_size, config.batch_timeout),
            handler,
            acker,
        }
    }

    /// 运行消费循环，直到关闭信号或消息流中断
    pub async fn run<S>(&self, mut stream: S, shutdown: &mut watch::Receiver<bool>) -> ConsumerExit
    where
        S: Stream<Item = Result<ConsumerMessage>> + Unpin,
    {
        info!(
            consumer = %self.name,
            batch_size = self.config.batch_size,
            batch_timeout_ms = self.config.batch_timeout.as_millis() as u64,
            "批量消费循环已启动"
        );

        let mut batch: Vec<ConsumerMessage> = Vec::with_capacity(self.config.batch_size);

        loop {
            if *shutdown.borrow() {
                return self.stopped();
            }

            // ---- Idle：等待第一条消息 ----
            let first = tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return self.stopped();
                    }
                    continue;
                }

                next = stream.next() => match next {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => return self.lost(e.to_string()),
                    None => return self.lost("消息流已结束".to_string()),
                }
            };

            let deadline = Instant::now() + self.config.batch_timeout;
            batch.push(first);

            // ---- Accruing ----
            while batch.len() < self.config.batch_size {
                tokio::select! {
                    biased;

                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            warn!(
                                consumer = %self.name,
                                pending = batch.len(),
                                "关闭时存在未刷出的批次，保持未确认等待重新投递"
                            );
                            return self.stopped();
                        }
                    }

                    _ = tokio::time::sleep_until(deadline) => break,

                    next = stream.next() => match next {
                        Some(Ok(msg)) => batch.push(msg),
                        Some(Err(e)) => return self.lost(e.to_string()),
                        None => return self.lost("消息流已结束".to_string()),
                    }
                }
            }

            // ---- Flushing ----
            if let Err(e) = self.flush(std::mem::take(&mut batch)).await {
                return self.lost(format!("确认失败: {e}"));
            }
        }
    }

    /// 处理一个完整批次并完成确认
    pub async fn flush(&self, batch: Vec<ConsumerMessage>) -> Result<BatchOutcome> {
        let size = batch.len();
        let Some(max_tag) = batch.iter().map(|m| m.delivery_tag).max() else {
            return Ok(BatchOutcome::Acked);
        };

        debug!(consumer = %self.name, size, max_tag, "刷出批次");

        let outcome = match self.dispatch(&batch).await {
            Ok(()) => {
                self.acker.ack_up_to(max_tag).await?;
                info!(consumer = %self.name, size, max_tag, "批次处理成功，已确认");
                BatchOutcome::Acked
            }
            Err(e) => {
                error!(
                    consumer = %self.name,
                    size,
                    error = %e,
                    "批次处理失败，整批拒绝进入死信"
                );
                for msg in &batch {
                    self.acker.reject(msg.delivery_tag).await?;
                }
                BatchOutcome::Rejected
            }
        };

        record_batch(&self.name, outcome, size);
        Ok(outcome)
    }

    async fn dispatch(&self, batch: &[ConsumerMessage]) -> Result<()> {
        let messages = batch
            .iter()
            .map(|m| m.deserialize_payload::<H::Message>())
            .collect::<Result<Vec<_>>>()?;

        self.handler.handle(messages).await
    }

    fn stopped(&self) -> ConsumerExit {
        info!(consumer = %self.name, "收到关闭信号，批量消费循环退出");
        ConsumerExit::Shutdown
    }

    fn lost(&self, reason: String) -> ConsumerExit {
        warn!(consumer = %self.name, reason = %reason, "消息流中断");
        ConsumerExit::ChannelLost(reason)
    }
}

fn record_batch(queue: &str, outcome: BatchOutcome, size: usize) {
    metrics::counter!(
        "consumer_batches_total",
        "queue" => queue.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    metrics::counter!(
        "consumer_messages_total",
        "queue" => queue.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(size as u64);
    metrics::histogram!("consumer_batch_size", "queue" => queue.to_string()).record(size as f64);
}
