//! 共享库
//!
//! 包含订单服务与审计消费者共用的配置、错误处理、数据库连接、
//! 消息模型、RabbitMQ 发布/确认以及批量消费引擎等基础设施代码。

pub mod amqp;
pub mod batch;
pub mod config;
pub mod database;
pub mod error;
pub mod messages;
pub mod observability;
pub mod test_utils;
