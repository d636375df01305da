//! 审计消费者错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("HTTP 客户端初始化失败: {0}")]
    ClientBuild(String),

    #[error("审计服务地址无效: {0}")]
    InvalidBaseUrl(String),

    #[error(transparent)]
    Shared(#[from] oms_shared::error::OmsError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms_shared::error::OmsError;

    #[test]
    fn test_error_display() {
        let err = ConsumerError::InvalidBaseUrl("ftp://x".to_string());
        assert_eq!(err.to_string(), "审计服务地址无效: ftp://x");

        let shared: ConsumerError = OmsError::Amqp("connection reset".to_string()).into();
        assert_eq!(shared.to_string(), "RabbitMQ 错误: connection reset");
    }
}
