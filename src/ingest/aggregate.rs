//! 流量统计聚合
//!
//! 每次请求都对全部条目做一次完整扫描，O(记录总数)。
//! 结果是存储内容的纯函数：两次调用之间没有新的追加时结果完全相同。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::traffic::{Batch, TrafficRecord};

use super::model::LogEntry;
use super::store::LogStore;

/// 默认排行榜长度
pub const DEFAULT_TOP_LIMIT: usize = 10;

/// 目标地址出现次数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationCount {
    pub ip: String,
    pub count: u64,
}

/// 全量统计快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSnapshot {
    pub total_logs: u64,
    pub total_packets: u64,
    pub total_bytes: u64,
    #[serde(rename = "uniqueIPs")]
    pub unique_destination_count: u64,
    pub top_destinations: Vec<DestinationCount>,
}

/// 单个批次的接收摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total_packets: u64,
    pub total_bytes: u64,
    pub unique_destinations: u64,
    /// RFC3339 格式
    pub received_at: String,
}

/// 聚合器
///
/// 持有存储句柄，`summarize()` 在读锁内复制条目列表后在锁外计算。
#[derive(Debug, Clone)]
pub struct Aggregator {
    store: Arc<LogStore>,
    top_limit: usize,
}

impl Aggregator {
    pub fn new(store: Arc<LogStore>) -> Self {
        Self::with_top_limit(store, DEFAULT_TOP_LIMIT)
    }

    pub fn with_top_limit(store: Arc<LogStore>, top_limit: usize) -> Self {
        Self { store, top_limit }
    }

    pub fn top_limit(&self) -> usize {
        self.top_limit
    }

    pub fn summarize(&self) -> AggregateSnapshot {
        summarize_entries(&self.store.all(), self.top_limit)
    }
}

/// 对给定条目计算统计快照
pub fn summarize_entries(entries: &[Arc<LogEntry>], top_limit: usize) -> AggregateSnapshot {
    let records = || entries.iter().flat_map(|e| e.batch.records.iter());
    let counts = count_destinations(records());

    AggregateSnapshot {
        total_logs: entries.len() as u64,
        total_packets: records().count() as u64,
        total_bytes: total_bytes(records()),
        unique_destination_count: counts.len() as u64,
        top_destinations: rank(counts, top_limit),
    }
}

/// 单个批次的摘要，计数规则与全量统计一致
pub fn summarize_batch(batch: &Batch, received_at: DateTime<Utc>) -> BatchSummary {
    BatchSummary {
        total_packets: batch.len() as u64,
        total_bytes: total_bytes(batch.records.iter()),
        unique_destinations: count_destinations(batch.records.iter()).len() as u64,
        received_at: received_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

/// 字节总数，超出 u64 时饱和
fn total_bytes<'a>(records: impl Iterator<Item = &'a TrafficRecord>) -> u64 {
    records.fold(0u64, |acc, r| {
        acc.saturating_add(u64::try_from(r.size_bytes()).unwrap_or(0))
    })
}

/// 按首次出现顺序统计每个目标地址的出现次数
fn count_destinations<'a>(
    records: impl Iterator<Item = &'a TrafficRecord>,
) -> Vec<(&'a str, u64)> {
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut counts: Vec<(&'a str, u64)> = Vec::new();

    for record in records {
        let dest = record.destination_address();
        match index.get(dest) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(dest, counts.len());
                counts.push((dest, 1));
            }
        }
    }
    counts
}

/// 按出现次数排序取前 `limit` 个
fn rank(mut counts: Vec<(&str, u64)>, limit: usize) -> Vec<DestinationCount> {
    // sort_by 是稳定排序，同次数保持首次出现顺序
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(limit)
        .map(|(ip, count)| DestinationCount {
            ip: ip.to_string(),
            count,
        })
        .collect()
}
