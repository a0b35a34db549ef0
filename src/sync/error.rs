//! 上传错误类型

/// 批次上传失败原因
///
/// 所有错误都可恢复：客户端不重试、不清空缓冲区，由调用方决定。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// 本地校验失败，不会发起网络请求
    #[error("no packets to sync")]
    EmptyBatch,

    /// 服务端返回非成功状态码，或回执中 `success` 为 false
    #[error("collector rejected batch (HTTP {status}): {body}")]
    Status { status: u16, body: String },

    /// 等待响应超时
    #[error("sync timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// 连接失败、DNS 失败等传输错误
    #[error("transport error: {0}")]
    Transport(String),

    /// 响应体无法解析
    #[error("invalid collector response: {0}")]
    Decode(String),
}

impl SyncError {
    pub(crate) fn from_reqwest(e: reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            Self::Timeout { timeout_secs }
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
