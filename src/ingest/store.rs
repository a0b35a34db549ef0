//! 内存日志存储
//!
//! 进程级状态：启动时为空，只追加，进程退出即丢弃。

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use crate::traffic::Batch;

use super::error::IngestError;
use super::model::{EntryId, LogEntry};

/// `list` 未指定条数时的默认值
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// 只追加的批次存储
///
/// 写锁内完成 ID/时间分配与追加，读者只会看到完整的条目。
#[derive(Debug, Default)]
pub struct LogStore {
    entries: RwLock<Vec<Arc<LogEntry>>>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 校验并追加批次，返回新条目 ID
    pub fn append(&self, batch: Batch) -> Result<EntryId, IngestError> {
        self.ingest(batch).map(|entry| entry.id.clone())
    }

    /// 校验并追加批次，返回入库后的条目
    ///
    /// 任意一条记录非法则整批拒绝，不会部分入库。
    pub fn ingest(&self, batch: Batch) -> Result<Arc<LogEntry>, IngestError> {
        validate(&batch)?;

        let mut entries = self.entries.write();
        let entry = Arc::new(LogEntry {
            id: EntryId::generate(),
            batch,
            received_at: Utc::now(),
        });
        entries.push(entry.clone());
        drop(entries);

        tracing::debug!(
            id = %entry.id,
            packets = entry.batch.len(),
            "批次已入库"
        );
        Ok(entry)
    }

    /// 最近追加的 `limit` 条，最新在前
    pub fn list(&self, limit: usize) -> Vec<Arc<LogEntry>> {
        self.entries.read().iter().rev().take(limit).cloned().collect()
    }

    /// 全部条目，按追加顺序
    pub fn all(&self) -> Vec<Arc<LogEntry>> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn validate(batch: &Batch) -> Result<(), IngestError> {
    if batch.is_empty() {
        return Err(IngestError::EmptyBatch);
    }
    let mut total_bytes: u64 = 0;
    for (index, record) in batch.records.iter().enumerate() {
        record
            .validate()
            .map_err(|violation| IngestError::InvalidRecord { index, violation })?;
        // validate 保证非负
        total_bytes = total_bytes
            .checked_add(record.size_bytes() as u64)
            .ok_or(IngestError::ByteTotalOverflow)?;
    }
    Ok(())
}
