//! RabbitMQ 基础设施封装
//!
//! 将 lapin 的底层 API 封装为业务友好的发布/确认抽象，
//! 统一连接重建、拓扑声明、消息序列化和错误映射，避免各服务重复编写样板代码。

use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use lapin::options::{
    BasicAckOptions, BasicNackOptions, BasicPublishOptions, ConfirmSelectOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::message::Delivery;
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{ExchangeMapping, RabbitMqConfig};
use crate::error::{OmsError, Result};
use crate::messages::OutgoingMessage;

/// 持久化投递模式
const PERSISTENT_DELIVERY_MODE: u8 = 2;

pub const DEAD_LETTER_EXCHANGE_ARG: &str = "x-dead-letter-exchange";
pub const DEAD_LETTER_ROUTING_KEY_ARG: &str = "x-dead-letter-routing-key";

// ---------------------------------------------------------------------------
// 连接
// ---------------------------------------------------------------------------

/// 建立 AMQP 连接，失败时按固定间隔重试
pub async fn connect_with_retry(config: &RabbitMqConfig) -> Result<Connection> {
    let uri = config.uri();
    let attempts = config.reconnect_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match Connection::connect(&uri, ConnectionProperties::default()).await {
            Ok(conn) => {
                info!(host = %config.host, port = config.port, "RabbitMQ 连接已建立");
                return Ok(conn);
            }
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "RabbitMQ 连接失败"
                );
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(config.reconnect_interval()).await;
                }
            }
        }
    }

    Err(last_error
        .map(OmsError::from)
        .unwrap_or_else(|| OmsError::Amqp("RabbitMQ 连接失败".to_string())))
}

// ---------------------------------------------------------------------------
// 拓扑
// ---------------------------------------------------------------------------

/// 计算队列的死信参数
///
/// 只有配置了死信目标的队列才会带上这两个参数。
pub fn dead_letter_arguments(mapping: &ExchangeMapping) -> Vec<(&'static str, String)> {
    match &mapping.dead_letter {
        Some(dl) => vec![
            (DEAD_LETTER_EXCHANGE_ARG, dl.dlx.clone()),
            (DEAD_LETTER_ROUTING_KEY_ARG, dl.routing_key.clone()),
        ],
        None => Vec::new(),
    }
}

fn queue_arguments(mapping: &ExchangeMapping) -> FieldTable {
    let mut table = FieldTable::default();
    for (key, value) in dead_letter_arguments(mapping) {
        table.insert(
            ShortString::from(key),
            AMQPValue::LongString(LongString::from(value)),
        );
    }
    table
}

/// 声明 topic 交换机、队列及绑定关系
///
/// 所有声明均为幂等操作，在每个新建的 channel 上重复执行是安全的。
pub async fn declare_topology(channel: &Channel, config: &RabbitMqConfig) -> Result<()> {
    let durable = ExchangeDeclareOptions {
        durable: true,
        ..Default::default()
    };

    channel
        .exchange_declare(
            &config.exchange,
            ExchangeKind::Topic,
            durable,
            FieldTable::default(),
        )
        .await?;

    for mapping in &config.exchange_mappings {
        if let Some(dl) = &mapping.dead_letter {
            channel
                .exchange_declare(&dl.dlx, ExchangeKind::Topic, durable, FieldTable::default())
                .await?;

            if let Some(dlq) = &dl.queue {
                channel
                    .queue_declare(
                        dlq,
                        QueueDeclareOptions {
                            durable: true,
                            ..Default::default()
                        },
                        FieldTable::default(),
                    )
                    .await?;
                channel
                    .queue_bind(
                        dlq,
                        &dl.dlx,
                        &dl.routing_key,
                        QueueBindOptions::default(),
                        FieldTable::default(),
                    )
                    .await?;
            }
        }

        channel
            .queue_declare(
                &mapping.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                queue_arguments(mapping),
            )
            .await?;

        channel
            .queue_bind(
                &mapping.queue,
                &config.exchange,
                &mapping.routing_key_pattern,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        debug!(
            queue = %mapping.queue,
            pattern = %mapping.routing_key_pattern,
            dead_letter = mapping.dead_letter.is_some(),
            "队列已声明并绑定"
        );
    }

    info!(
        exchange = %config.exchange,
        queues = config.exchange_mappings.len(),
        "RabbitMQ 拓扑已声明"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// EventPublisher
// ---------------------------------------------------------------------------

/// 领域事件发布接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// 按顺序发布一组消息，任一失败即返回错误
    async fn publish(&self, messages: &[OutgoingMessage]) -> Result<()>;
}

struct PublisherState {
    connection: Connection,
    channel: Channel,
}

/// 基于 topic 交换机的事件发布者
///
/// 连接和 channel 在首次发布时惰性建立并复用；发现 channel 或连接已关闭时
/// 自动重建并重新声明拓扑。AMQP channel 不支持并发使用，所有发布都经由
/// 内部的异步互斥锁串行执行，调用方无需感知。
pub struct RabbitMqPublisher {
    config: RabbitMqConfig,
    state: Mutex<Option<PublisherState>>,
}

impl RabbitMqPublisher {
    pub fn new(config: RabbitMqConfig) -> Self {
        Self {
            config,
            state: Mutex::new(None),
        }
    }

    async fn open_channel(&self, connection: &Connection) -> Result<Channel> {
        let channel = connection.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        declare_topology(&channel, &self.config).await?;
        Ok(channel)
    }

    /// 保证存在可用的 channel，必要时复用存活的连接
    async fn ensure_state(&self, slot: &mut Option<PublisherState>) -> Result<()> {
        if slot
            .as_ref()
            .is_some_and(|s| s.channel.status().connected())
        {
            return Ok(());
        }

        let connection = match slot.take() {
            Some(state) if state.connection.status().connected() => {
                warn!("发布 channel 已关闭，正在重建");
                state.connection
            }
            _ => connect_with_retry(&self.config).await?,
        };

        let channel = self.open_channel(&connection).await?;
        *slot = Some(PublisherState {
            connection,
            channel,
        });
        Ok(())
    }

    async fn publish_one(channel: &Channel, exchange: &str, msg: &OutgoingMessage) -> Result<()> {
        let body = msg.body()?;
        let properties = BasicProperties::default()
            .with_content_type(ShortString::from("application/json"))
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
            .with_message_id(ShortString::from(msg.message_id.to_string()));

        let confirmation = channel
            .basic_publish(
                exchange,
                &msg.routing_key,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await?
            .await?;

        if confirmation.is_nack() {
            return Err(OmsError::Amqp(format!(
                "broker 拒绝消息: message_id={}",
                msg.message_id
            )));
        }

        debug!(
            routing_key = %msg.routing_key,
            message_id = %msg.message_id,
            "消息已发布"
        );
        Ok(())
    }

    /// 关闭 channel 和连接
    pub async fn close(&self) {
        let mut slot = self.state.lock().await;
        if let Some(state) = slot.take() {
            if let Err(e) = state.channel.close(200, "OK").await {
                warn!(error = %e, "关闭发布 channel 失败");
            }
            if let Err(e) = state.connection.close(200, "OK").await {
                warn!(error = %e, "关闭 RabbitMQ 连接失败");
            }
            info!("RabbitMQ 发布者已关闭");
        }
    }
}

#[async_trait]
impl EventPublisher for RabbitMqPublisher {
    async fn publish(&self, messages: &[OutgoingMessage]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut slot = self.state.lock().await;
        self.ensure_state(&mut slot).await?;

        let Some(state) = slot.as_ref() else {
            return Err(OmsError::Internal("发布 channel 不可用".to_string()));
        };

        for msg in messages {
            if let Err(e) = Self::publish_one(&state.channel, &self.config.exchange, msg).await {
                error!(
                    routing_key = %msg.routing_key,
                    message_id = %msg.message_id,
                    error = %e,
                    "发布消息失败"
                );
                // 丢弃可能已损坏的 channel，下次发布时重建
                *slot = None;
                return Err(e);
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的消息的统一表示
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub delivery_tag: u64,
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub redelivered: bool,
}

impl ConsumerMessage {
    fn from_delivery(delivery: Delivery) -> Self {
        Self {
            delivery_tag: delivery.delivery_tag,
            routing_key: delivery.routing_key.as_str().to_string(),
            payload: delivery.data,
            redelivered: delivery.redelivered,
        }
    }

    /// 将 JSON 格式负载反序列化为目标类型
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.payload).map_err(|e| {
            OmsError::Decode(format!("delivery_tag={} 负载反序列化失败: {e}", self.delivery_tag))
        })
    }
}

/// 将 lapin 消费者转换为 ConsumerMessage 流
pub fn delivery_stream(
    consumer: lapin::Consumer,
) -> impl Stream<Item = Result<ConsumerMessage>> + Send + Unpin {
    consumer.map(|delivery| {
        delivery
            .map(ConsumerMessage::from_delivery)
            .map_err(OmsError::from)
    })
}

// ---------------------------------------------------------------------------
// DeliveryAcker
// ---------------------------------------------------------------------------

/// 投递确认接口
///
/// 批量消费引擎只通过该接口确认或拒绝消息，便于在测试中记录调用。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryAcker: Send + Sync {
    /// 累积确认，确认 tag 小于等于 `delivery_tag` 的全部未确认消息
    async fn ack_up_to(&self, delivery_tag: u64) -> Result<()>;

    /// 拒绝单条消息且不重新入队（有死信配置时进入死信交换机）
    async fn reject(&self, delivery_tag: u64) -> Result<()>;
}

/// 基于 lapin channel 的确认实现
#[derive(Clone)]
pub struct ChannelAcker {
    channel: Channel,
}

impl ChannelAcker {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl DeliveryAcker for ChannelAcker {
    async fn ack_up_to(&self, delivery_tag: u64) -> Result<()> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions { multiple: true })
            .await?;
        Ok(())
    }

    async fn reject(&self, delivery_tag: u64) -> Result<()> {
        self.channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    multiple: false,
                    requeue: false,
                },
            )
            .await?;
        Ok(())
    }
}

/// 兜底等待，避免关闭时无限阻塞
pub async fn close_quietly(channel: &Channel, connection: &Connection, timeout: Duration) {
    let close = async {
        if let Err(e) = channel.close(200, "OK").await {
            warn!(error = %e, "关闭 channel 失败");
        }
        if let Err(e) = connection.close(200, "OK").await {
            warn!(error = %e, "关闭 RabbitMQ 连接失败");
        }
    };
    if tokio::time::timeout(timeout, close).await.is_err() {
        warn!("关闭 RabbitMQ 连接超时");
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------
