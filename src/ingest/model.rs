//! 采集端日志条目数据模型

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::traffic::Batch;

/// 日志条目 ID（UUID v4）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 已接收的批次
///
/// 只追加，入库后不再修改；对外以 `Arc<LogEntry>` 共享。
/// 序列化形如 `{ id, packets, timestamp, receivedAt }`。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: EntryId,
    #[serde(flatten)]
    pub batch: Batch,
    /// 服务端接收时间，统计窗口以此为准
    pub received_at: DateTime<Utc>,
}
