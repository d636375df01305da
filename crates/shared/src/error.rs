//! 统一错误处理模块
//!
//! 定义订单系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum OmsError {
    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ==================== 序列化错误 ====================
    #[error("序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("消息解码失败: {0}")]
    Decode(String),

    // ==================== 消息总线错误 ====================
    #[error("RabbitMQ 错误: {0}")]
    Amqp(String),

    // ==================== 业务逻辑错误 ====================
    #[error("Invalid status transition from {current} to {target} for order {order_id}")]
    InvalidTransition {
        order_id: i64,
        current: String,
        target: String,
    },

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    // ==================== 外部服务错误 ====================
    #[error("审计服务调用失败: status={status:?} - {message}")]
    ForwardingFailed {
        status: Option<u16>,
        message: String,
    },

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, OmsError>;

impl OmsError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Amqp(_) => "AMQP_ERROR",
            Self::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ForwardingFailed { .. } => "FORWARDING_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为调用方输入导致的错误（不应重试）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidTransition { .. } | Self::NotFound { .. }
        )
    }
}

impl From<lapin::Error> for OmsError {
    fn from(err: lapin::Error) -> Self {
        Self::Amqp(err.to_string())
    }
}
