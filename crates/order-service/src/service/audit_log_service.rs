//! 审计日志服务
//!
//! 只追加写入，不做去重；同一批记录提交两次会得到两份记录。

use std::sync::Arc;

use chrono::Utc;
use oms_shared::error::Result;
use oms_shared::messages::AuditLogOrder;
use tracing::{info, instrument};

use crate::models::AuditLogRecord;
use crate::repository::AuditLogRepositoryTrait;

pub struct AuditLogService<R> {
    repo: Arc<R>,
}

impl<R> Clone for AuditLogService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R: AuditLogRepositoryTrait> AuditLogService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// 批量写入审计记录，返回带时间戳的已落库记录
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn batch_insert(&self, records: Vec<AuditLogOrder>) -> Result<Vec<AuditLogRecord>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.repo.batch_insert(&records, Utc::now()).await?;
        info!(count = rows.len(), "审计记录写入完成");
        Ok(rows)
    }
}
