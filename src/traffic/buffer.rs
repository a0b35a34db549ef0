//! 客户端有界缓冲区
//!
//! 只保留最近 N 条记录，溢出时静默丢弃最旧的记录。
//! 丢弃是容量上限内的预期行为，不产生告警。

use std::collections::VecDeque;

use parking_lot::RwLock;

use super::record::TrafficRecord;

/// 默认缓冲容量
pub const DEFAULT_CAPACITY: usize = 100;

/// 有界流量缓冲区
///
/// 内部按最新在前存储，与界面展示顺序一致，队头插入为 O(1)。
/// 单写多读：快照只会看到某次 push 之前或之后的完整状态。
#[derive(Debug)]
pub struct PacketBuffer {
    capacity: usize,
    slots: RwLock<Slots>,
}

#[derive(Debug, Default)]
struct Slots {
    records: VecDeque<TrafficRecord>,
    /// 累计 push 次数，clear 不重置
    pushed: u64,
}

/// 上传批次的切点
///
/// 由 [`PacketBuffer::checkpoint`] 生成，标记批次包含的最后一次 push。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncMark(u64);

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// 指定容量创建（最小为 1）
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            slots: RwLock::new(Slots {
                records: VecDeque::with_capacity(capacity + 1),
                pushed: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 插入一条记录，超出容量时丢弃最旧的一条
    pub fn push(&self, record: TrafficRecord) {
        let mut slots = self.slots.write();
        slots.records.push_front(record);
        slots.pushed += 1;
        if slots.records.len() > self.capacity {
            slots.records.pop_back();
            tracing::trace!(capacity = self.capacity, "缓冲区已满，丢弃最旧记录");
        }
    }

    /// 当前内容（最新在前），不修改状态
    pub fn snapshot(&self) -> Vec<TrafficRecord> {
        self.slots.read().records.iter().cloned().collect()
    }

    /// 当前内容（抓包顺序，最旧在前），用于组装上传批次
    pub fn in_capture_order(&self) -> Vec<TrafficRecord> {
        self.slots.read().records.iter().rev().cloned().collect()
    }

    /// 抓包顺序的当前内容及其切点，两者在同一把读锁内取得
    pub fn checkpoint(&self) -> (Vec<TrafficRecord>, SyncMark) {
        let slots = self.slots.read();
        let records = slots.records.iter().rev().cloned().collect();
        (records, SyncMark(slots.pushed))
    }

    /// 移除切点及之前 push 的记录，之后到达的记录保留
    ///
    /// 返回移除的条数。
    pub fn remove_through(&self, mark: SyncMark) -> usize {
        let mut slots = self.slots.write();
        // 切点之后的 push 都在队头
        let newer = slots.pushed.saturating_sub(mark.0);
        let keep = usize::try_from(newer)
            .map_or(slots.records.len(), |n| n.min(slots.records.len()));
        let removed = slots.records.len() - keep;
        slots.records.truncate(keep);
        removed
    }

    pub fn clear(&self) {
        self.slots.write().records.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn record(i: i64) -> TrafficRecord {
        TrafficRecord::new("10.0.0.1", format!("10.1.0.{}", i % 250), i, i)
    }

    #[test]
    fn test_snapshot_is_most_recent_first() {
        let buffer = PacketBuffer::new();
        for i in 0..3 {
            buffer.push(record(i));
        }

        let sizes: Vec<i64> = buffer.snapshot().iter().map(|r| r.size_bytes()).collect();
        assert_eq!(sizes, vec![2, 1, 0]);

        let ordered: Vec<i64> = buffer
            .in_capture_order()
            .iter()
            .map(|r| r.size_bytes())
            .collect();
        assert_eq!(ordered, vec![0, 1, 2]);
    }

    #[test]
    fn test_overflow_keeps_most_recent() {
        let buffer = PacketBuffer::new();
        for i in 0..250 {
            buffer.push(record(i));
        }

        // 只保留最近 100 条，最旧的先被丢弃
        assert_eq!(buffer.len(), DEFAULT_CAPACITY);
        let ordered: Vec<i64> = buffer
            .in_capture_order()
            .iter()
            .map(|r| r.size_bytes())
            .collect();
        let expected: Vec<i64> = (150..250).collect();
        assert_eq!(ordered, expected);
    }

    #[test]
    fn test_exact_capacity_does_not_evict() {
        let buffer = PacketBuffer::new();
        for i in 0..100 {
            buffer.push(record(i));
        }

        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.in_capture_order()[0].size_bytes(), 0);
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let buffer = PacketBuffer::with_capacity(5);
        buffer.push(record(1));
        let _ = buffer.snapshot();
        let _ = buffer.in_capture_order();
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_clear() {
        let buffer = PacketBuffer::new();
        buffer.push(record(1));
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let buffer = PacketBuffer::with_capacity(0);
        buffer.push(record(1));
        buffer.push(record(2));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.snapshot()[0].size_bytes(), 2);
    }

    #[test]
    fn test_concurrent_push_and_snapshot() {
        let buffer = Arc::new(PacketBuffer::new());

        let writer = {
            let buffer = buffer.clone();
            std::thread::spawn(move || {
                for i in 0..1000 {
                    buffer.push(record(i));
                }
            })
        };

        // 并发读取时快照长度始终不超过容量，且保持严格递减顺序
        for _ in 0..200 {
            let snapshot = buffer.snapshot();
            assert!(snapshot.len() <= DEFAULT_CAPACITY);
            assert!(
                snapshot
                    .windows(2)
                    .all(|w| w[0].size_bytes() > w[1].size_bytes())
            );
        }

        writer.join().unwrap();
        assert_eq!(buffer.len(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_remove_through_keeps_later_records() {
        let buffer = PacketBuffer::new();
        buffer.push(record(0));
        buffer.push(record(1));
        let (batch, mark) = buffer.checkpoint();
        assert_eq!(batch.len(), 2);

        // 上传期间到达的记录
        buffer.push(record(2));

        assert_eq!(buffer.remove_through(mark), 2);
        let sizes: Vec<i64> = buffer.snapshot().iter().map(|r| r.size_bytes()).collect();
        assert_eq!(sizes, vec![2]);
    }

    #[test]
    fn test_remove_through_after_eviction() {
        let buffer = PacketBuffer::with_capacity(3);
        for i in 0..3 {
            buffer.push(record(i));
        }
        let (_, mark) = buffer.checkpoint();

        // 新记录挤掉了部分已上传记录
        for i in 3..5 {
            buffer.push(record(i));
        }

        assert_eq!(buffer.remove_through(mark), 1);
        let ordered: Vec<i64> = buffer
            .in_capture_order()
            .iter()
            .map(|r| r.size_bytes())
            .collect();
        assert_eq!(ordered, vec![3, 4]);
    }

    #[test]
    fn test_remove_through_after_clear() {
        let buffer = PacketBuffer::new();
        buffer.push(record(0));
        let (_, mark) = buffer.checkpoint();

        buffer.clear();
        buffer.push(record(1));

        assert_eq!(buffer.remove_through(mark), 0);
        assert_eq!(buffer.len(), 1);
    }
}
