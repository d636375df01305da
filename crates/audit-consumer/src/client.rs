//! 审计服务 HTTP 客户端
//!
//! 把一批审计记录 POST 到 `{base_url}/api/v1/audit/log-order`，不做内部重试；
//! 失败由批量消费引擎整批拒绝，交给死信队列处理。

use std::time::Duration;

use async_trait::async_trait;
use oms_shared::config::AuditClientConfig;
use oms_shared::error::{OmsError, Result};
use oms_shared::messages::{LogOrdersRequest, LogOrdersResponse};
use oms_shared::observability::metrics as oms_metrics;
use tracing::{debug, warn};

use crate::error::ConsumerError;

const LOG_ORDER_PATH: &str = "/api/v1/audit/log-order";

/// 审计记录转发接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditForwarder: Send + Sync {
    async fn log_orders(&self, request: LogOrdersRequest) -> Result<LogOrdersResponse>;
}

/// 基于 reqwest 的审计服务客户端
#[derive(Clone)]
pub struct OmsClient {
    http: reqwest::Client,
    endpoint: String,
}

impl OmsClient {
    pub fn new(config: &AuditClientConfig) -> std::result::Result<Self, ConsumerError> {
        let base = config.base_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConsumerError::InvalidBaseUrl(config.base_url.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .map_err(|e| ConsumerError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{base}{LOG_ORDER_PATH}"),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn transport_error(e: reqwest::Error) -> OmsError {
    OmsError::ForwardingFailed {
        status: None,
        message: e.to_string(),
    }
}

#[async_trait]
impl AuditForwarder for OmsClient {
    async fn log_orders(&self, request: LogOrdersRequest) -> Result<LogOrdersResponse> {
        let count = request.orders.len();

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                oms_metrics::record_audit_forwarded("transport_error", count);
                transport_error(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "审计服务返回错误");
            oms_metrics::record_audit_forwarded("rejected", count);
            return Err(OmsError::ForwardingFailed {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let parsed = response.json::<LogOrdersResponse>().await.map_err(|e| {
            oms_metrics::record_audit_forwarded("decode_error", count);
            transport_error(e)
        })?;

        oms_metrics::record_audit_forwarded("success", count);
        debug!(sent = count, stored = parsed.orders.len(), "审计记录已转发");
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = OmsClient::new(&AuditClientConfig {
            base_url: "http://oms:8080/".to_string(),
            timeout_seconds: 5,
        })
        .unwrap();
        assert_eq!(client.endpoint(), "http://oms:8080/api/v1/audit/log-order");
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let result = OmsClient::new(&AuditClientConfig {
            base_url: "oms:8080".to_string(),
            timeout_seconds: 5,
        });
        assert!(matches!(result, Err(ConsumerError::InvalidBaseUrl(_))));
    }
}
