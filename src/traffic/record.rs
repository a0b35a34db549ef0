//! 流量记录与批次数据模型

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// 单条流量记录违反的约束
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordViolation {
    #[error("sourceIp must not be empty")]
    EmptySourceAddress,
    #[error("destIp must not be empty")]
    EmptyDestinationAddress,
    #[error("size must be non-negative, got {0}")]
    NegativeSize(i64),
}

/// 流量记录
///
/// 由外部抓包组件产生，构造后不可变：字段私有，只提供只读访问。
/// `size` 在线路格式中是有符号整数，负值在校验阶段被拒绝而不是在反序列化阶段。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRecord {
    #[serde(rename = "sourceIp")]
    source_address: String,
    #[serde(rename = "destIp")]
    destination_address: String,
    #[serde(rename = "size")]
    size_bytes: i64,
    /// 抓包端时钟（毫秒时间戳），不保证单调
    #[serde(rename = "timestamp")]
    observed_at: i64,
}

impl TrafficRecord {
    pub fn new(
        source_address: impl Into<String>,
        destination_address: impl Into<String>,
        size_bytes: i64,
        observed_at: i64,
    ) -> Self {
        Self {
            source_address: source_address.into(),
            destination_address: destination_address.into(),
            size_bytes,
            observed_at,
        }
    }

    pub fn source_address(&self) -> &str {
        &self.source_address
    }

    pub fn destination_address(&self) -> &str {
        &self.destination_address
    }

    pub fn size_bytes(&self) -> i64 {
        self.size_bytes
    }

    /// 抓包时间（毫秒时间戳）
    pub fn observed_at_millis(&self) -> i64 {
        self.observed_at
    }

    /// 抓包时间，超出 chrono 可表示范围时返回 None
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.observed_at).single()
    }

    /// 校验记录不变量：地址非空、大小非负
    pub fn validate(&self) -> Result<(), RecordViolation> {
        if self.source_address.trim().is_empty() {
            return Err(RecordViolation::EmptySourceAddress);
        }
        if self.destination_address.trim().is_empty() {
            return Err(RecordViolation::EmptyDestinationAddress);
        }
        if self.size_bytes < 0 {
            return Err(RecordViolation::NegativeSize(self.size_bytes));
        }
        Ok(())
    }
}

/// 上传批次
///
/// `records` 按抓包顺序（最旧在前）排列。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(rename = "packets")]
    pub records: Vec<TrafficRecord>,
    /// 客户端组装批次的时间（毫秒时间戳）
    #[serde(rename = "timestamp")]
    pub client_timestamp: i64,
}

impl Batch {
    pub fn new(records: Vec<TrafficRecord>, client_timestamp: i64) -> Self {
        Self {
            records,
            client_timestamp,
        }
    }

    /// 复制记录并以当前时间组装批次
    pub fn assemble(records: &[TrafficRecord]) -> Self {
        Self::new(records.to_vec(), Utc::now().timestamp_millis())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
