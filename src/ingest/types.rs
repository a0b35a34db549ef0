//! 采集端 API 请求/响应类型

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::traffic::TrafficRecord;

use super::aggregate::BatchSummary;
use super::model::LogEntry;

/// POST /analyze 请求体
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// 缺失时返回 400
    #[serde(default)]
    pub packets: Option<Vec<TrafficRecord>>,
    /// 客户端组装时间（毫秒），缺失时使用服务端时间
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// POST /analyze 响应
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub id: String,
    pub summary: BatchSummary,
}

/// GET /logs 查询参数
///
/// `limit` 按字符串接收，无法解析时回退到默认值而不是拒绝请求
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<String>,
}

/// GET /logs 响应
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub total: usize,
    pub logs: Vec<Arc<LogEntry>>,
}

/// GET /health 响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// 运行时长（秒）
    pub uptime: f64,
}

/// 错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                error_type: error_type.into(),
                message: message.into(),
            },
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new("invalid_request_error", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}
