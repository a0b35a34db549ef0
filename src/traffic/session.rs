//! 监控会话
//!
//! 把事件源、缓冲区和上传客户端串起来：
//! 开始监控时清空缓冲区并订阅事件源，停止时注销订阅，按需上传。

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::sync::{AcceptanceReport, SyncClient, SyncError};

use super::buffer::PacketBuffer;
use super::record::TrafficRecord;
use super::source::{CaptureError, CaptureSource, SubscriptionToken};

/// 会话状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionStatus {
    Idle,
    Active,
    /// 平台抓包能力缺失
    SetupRequired,
    Syncing,
    /// 上传失败，缓冲区数据保留
    SyncFailed { message: String },
    /// 缓冲区为空，没有可上传的数据
    NoData,
}

/// 监控会话
pub struct MonitorSession {
    source: Arc<dyn CaptureSource>,
    buffer: Arc<PacketBuffer>,
    client: SyncClient,
    subscription: Mutex<Option<SubscriptionToken>>,
    status: RwLock<SessionStatus>,
    clear_on_sync: bool,
}

impl MonitorSession {
    pub fn new(
        source: Arc<dyn CaptureSource>,
        buffer: Arc<PacketBuffer>,
        client: SyncClient,
    ) -> Self {
        Self {
            source,
            buffer,
            client,
            subscription: Mutex::new(None),
            status: RwLock::new(SessionStatus::Idle),
            clear_on_sync: false,
        }
    }

    /// 上传成功后是否清空缓冲区（默认保留，供界面继续展示）
    pub fn with_clear_on_sync(mut self, clear_on_sync: bool) -> Self {
        self.clear_on_sync = clear_on_sync;
        self
    }

    pub fn buffer(&self) -> &Arc<PacketBuffer> {
        &self.buffer
    }

    pub fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    pub fn is_monitoring(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// 开始新的监控会话
    ///
    /// 事件源无法启动时状态变为 `SetupRequired` 并返回错误，不订阅。
    pub fn start(&self) -> Result<(), CaptureError> {
        // 先注销旧订阅，避免新旧回调同时写入缓冲区
        if let Some(previous) = self.subscription.lock().take() {
            self.source.unsubscribe(previous);
        }
        self.buffer.clear();

        if let Err(e) = self.source.start() {
            *self.status.write() = SessionStatus::SetupRequired;
            return Err(e);
        }

        let buffer = self.buffer.clone();
        let token = self
            .source
            .subscribe(Arc::new(move |record: &TrafficRecord| {
                buffer.push(record.clone())
            }));

        if let Some(stale) = self.subscription.lock().replace(token) {
            self.source.unsubscribe(stale);
        }

        *self.status.write() = SessionStatus::Active;
        tracing::info!("开始流量监控");
        Ok(())
    }

    /// 停止监控；缓冲区内容保留
    pub fn stop(&self) {
        if let Some(token) = self.subscription.lock().take() {
            self.source.unsubscribe(token);
        }
        self.source.stop();
        *self.status.write() = SessionStatus::Idle;
        tracing::info!(buffered = self.buffer.len(), "停止流量监控");
    }

    /// 上传当前缓冲区内容
    ///
    /// 按抓包顺序上传；失败时缓冲区不变，状态变为 `SyncFailed`。
    /// 开启 `clear_on_sync` 时只移除本次上传的记录，上传期间到达的记录保留。
    pub async fn sync(&self) -> Result<AcceptanceReport, SyncError> {
        let (records, mark) = self.buffer.checkpoint();
        if records.is_empty() {
            *self.status.write() = SessionStatus::NoData;
            return Err(SyncError::EmptyBatch);
        }

        *self.status.write() = SessionStatus::Syncing;

        match self.client.sync(&records).await {
            Ok(report) => {
                if self.clear_on_sync {
                    let removed = self.buffer.remove_through(mark);
                    tracing::debug!(removed, remaining = self.buffer.len(), "移除已上传记录");
                }
                *self.status.write() = self.resting_status();
                Ok(report)
            }
            Err(e) => {
                tracing::warn!("上传失败，保留 {} 条缓冲记录: {}", records.len(), e);
                *self.status.write() = SessionStatus::SyncFailed {
                    message: e.to_string(),
                };
                Err(e)
            }
        }
    }

    fn resting_status(&self) -> SessionStatus {
        if self.is_monitoring() {
            SessionStatus::Active
        } else {
            SessionStatus::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traffic::source::{LiveCapture, ManualCapture, PacketCallback, SubscriberRegistry};

    /// 每次有新订阅时立即广播一条记录
    #[derive(Default)]
    struct GreetingCapture {
        subscribers: SubscriberRegistry,
    }

    impl CaptureSource for GreetingCapture {
        fn subscribe(&self, callback: PacketCallback) -> SubscriptionToken {
            let token = self.subscribers.subscribe(callback);
            self.subscribers.broadcast(&TrafficRecord::new("10.0.0.1", "hello", 1, 1));
            token
        }

        fn unsubscribe(&self, token: SubscriptionToken) {
            self.subscribers.unsubscribe(token);
        }

        fn start(&self) -> Result<(), CaptureError> {
            Ok(())
        }

        fn stop(&self) {}

        fn is_active(&self) -> bool {
            true
        }
    }

    fn offline_client() -> SyncClient {
        SyncClient::new("http://127.0.0.1:9/api", 1, None).unwrap()
    }

    #[test]
    fn test_start_clears_buffer_and_routes_records() {
        let source = Arc::new(ManualCapture::new());
        let buffer = Arc::new(PacketBuffer::new());
        buffer.push(TrafficRecord::new("old", "old", 1, 1));

        let session = MonitorSession::new(source.clone(), buffer.clone(), offline_client());
        session.start().unwrap();

        assert!(buffer.is_empty());
        assert_eq!(session.status(), SessionStatus::Active);

        source.emit(TrafficRecord::new("10.0.0.1", "8.8.8.8", 10, 2));
        assert_eq!(buffer.len(), 1);

        session.stop();
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(source.subscriber_count(), 0);

        // 停止后不再接收，已有数据保留
        source.emit(TrafficRecord::new("10.0.0.1", "8.8.8.8", 10, 3));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_restart_does_not_double_subscribe() {
        let source = Arc::new(ManualCapture::new());
        let session = MonitorSession::new(
            source.clone(),
            Arc::new(PacketBuffer::new()),
            offline_client(),
        );

        session.start().unwrap();
        session.start().unwrap();
        assert_eq!(source.subscriber_count(), 1);
    }

    #[test]
    fn test_restart_records_reach_buffer_once() {
        let source = Arc::new(GreetingCapture::default());
        let buffer = Arc::new(PacketBuffer::new());
        let session = MonitorSession::new(source.clone(), buffer.clone(), offline_client());

        session.start().unwrap();
        assert_eq!(buffer.len(), 1);

        // 重新开始时旧订阅已注销，新订阅期间的记录只写入一次
        session.start().unwrap();
        assert_eq!(buffer.len(), 1);
        assert_eq!(source.subscribers.len(), 1);
    }

    #[test]
    fn test_unavailable_capture_requires_setup() {
        let session = MonitorSession::new(
            Arc::new(LiveCapture::new()),
            Arc::new(PacketBuffer::new()),
            offline_client(),
        );

        assert_eq!(session.start(), Err(CaptureError::CapabilityUnavailable));
        assert_eq!(session.status(), SessionStatus::SetupRequired);
        assert!(!session.is_monitoring());
    }

    #[tokio::test]
    async fn test_sync_without_data_reports_no_data() {
        let session = MonitorSession::new(
            Arc::new(ManualCapture::new()),
            Arc::new(PacketBuffer::new()),
            offline_client(),
        );

        assert_eq!(session.sync().await, Err(SyncError::EmptyBatch));
        assert_eq!(session.status(), SessionStatus::NoData);
    }

    #[tokio::test]
    async fn test_failed_sync_keeps_buffer() {
        let source = Arc::new(ManualCapture::new());
        let buffer = Arc::new(PacketBuffer::new());
        let session = MonitorSession::new(source.clone(), buffer.clone(), offline_client())
            .with_clear_on_sync(true);

        session.start().unwrap();
        source.emit(TrafficRecord::new("10.0.0.1", "8.8.8.8", 10, 1));
        source.emit(TrafficRecord::new("10.0.0.1", "1.1.1.1", 20, 2));

        assert!(session.sync().await.is_err());
        assert_eq!(buffer.len(), 2);
        assert!(matches!(session.status(), SessionStatus::SyncFailed { .. }));
    }
}
