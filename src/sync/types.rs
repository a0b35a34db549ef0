//! 上传客户端响应类型

use serde::Deserialize;

use crate::ingest::BatchSummary;

/// 服务端接收批次后的回执
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptanceReport {
    pub success: bool,
    /// 服务端分配的日志条目 ID（旧版服务端不返回）
    #[serde(default)]
    pub id: Option<String>,
    pub summary: BatchSummary,
}

/// 健康检查响应
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthReport {
    pub status: String,
    /// 服务端运行时长（秒）
    pub uptime: f64,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
