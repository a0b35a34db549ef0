//! 采集端错误类型

use axum::http::StatusCode;

use crate::traffic::RecordViolation;

use super::types::ErrorResponse;

/// 批次入库失败
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("batch contains no packets")]
    EmptyBatch,

    #[error("packet #{index} is invalid: {violation}")]
    InvalidRecord {
        index: usize,
        violation: RecordViolation,
    },

    #[error("batch byte total overflows u64")]
    ByteTotalOverflow,
}

impl IngestError {
    /// 校验类错误一律映射为 400
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    pub fn into_response(self) -> ErrorResponse {
        ErrorResponse::invalid_request(self.to_string())
    }
}
