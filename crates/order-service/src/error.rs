//! HTTP 层错误类型
//!
//! 把 `OmsError` 映射为 HTTP 状态码与统一的 JSON 错误体。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use oms_shared::error::OmsError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub OmsError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            OmsError::Validation(_) | OmsError::InvalidTransition { .. } | OmsError::Decode(_) => {
                StatusCode::BAD_REQUEST
            }
            OmsError::NotFound { .. } => StatusCode::NOT_FOUND,
            OmsError::Amqp(_) | OmsError::ForwardingFailed { .. } => StatusCode::BAD_GATEWAY,
            OmsError::Database(_) | OmsError::Serialization(_) | OmsError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 服务端错误只返回通用提示，详细信息记录日志
        let message = if status.is_server_error() {
            tracing::error!(error = %self.0, code = self.0.code(), "请求处理失败");
            "服务内部错误，请稍后重试".to_string()
        } else {
            self.0.to_string()
        };

        let body = json!({
            "success": false,
            "code": self.0.code(),
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self(OmsError::Validation(errors.to_string()))
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
