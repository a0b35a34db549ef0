//! 抓包事件源抽象
//!
//! 真正的抓包（平台 VPN 拦截）由外部组件提供，这里只定义订阅/启停契约：
//! - [`LiveCapture`]：平台抓包能力，本项目中不可用，`start()` 返回
//!   [`CaptureError::CapabilityUnavailable`]
//! - [`ManualCapture`]：不自行产生数据，由外部调用 `emit()` 注入记录

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use super::record::TrafficRecord;

/// 订阅回调
pub type PacketCallback = Arc<dyn Fn(&TrafficRecord) + Send + Sync>;

/// 订阅令牌，单调递增，因此按令牌排序即为注册顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// 平台抓包能力缺失，调用方应展示"需要配置"状态
    #[error("packet capture capability is unavailable on this platform")]
    CapabilityUnavailable,
}

/// 抓包事件源
pub trait CaptureSource: Send + Sync {
    /// 注册回调，返回用于注销的令牌
    fn subscribe(&self, callback: PacketCallback) -> SubscriptionToken;

    /// 注销回调；重复注销或事件源已停止时为空操作
    fn unsubscribe(&self, token: SubscriptionToken);

    /// 开始抓包；重复调用不报错
    fn start(&self) -> Result<(), CaptureError>;

    /// 停止抓包；重复调用不报错
    fn stop(&self);

    fn is_active(&self) -> bool;
}

/// 订阅者注册表
///
/// 令牌到回调的映射，注销按令牌删除（集合差），天然幂等。
#[derive(Default)]
pub struct SubscriberRegistry {
    next_token: AtomicU64,
    callbacks: RwLock<BTreeMap<SubscriptionToken, PacketCallback>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: PacketCallback) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.callbacks.write().insert(token, callback);
        token
    }

    /// 返回是否真的移除了订阅
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.callbacks.write().remove(&token).is_some()
    }

    /// 按注册顺序广播给所有订阅者，返回送达数量
    ///
    /// 回调在锁外执行，回调内部可以安全地订阅或注销。
    pub fn broadcast(&self, record: &TrafficRecord) -> usize {
        let callbacks: Vec<PacketCallback> = self.callbacks.read().values().cloned().collect();
        for callback in &callbacks {
            callback(record);
        }
        callbacks.len()
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }
}

/// 平台抓包事件源
///
/// 平台能力不在本项目内，启动总是失败。
#[derive(Default)]
pub struct LiveCapture {
    subscribers: SubscriberRegistry,
}

impl LiveCapture {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureSource for LiveCapture {
    fn subscribe(&self, callback: PacketCallback) -> SubscriptionToken {
        self.subscribers.subscribe(callback)
    }

    fn unsubscribe(&self, token: SubscriptionToken) {
        self.subscribers.unsubscribe(token);
    }

    fn start(&self) -> Result<(), CaptureError> {
        tracing::warn!("平台抓包模块不可用，需要先完成原生组件配置");
        Err(CaptureError::CapabilityUnavailable)
    }

    fn stop(&self) {}

    fn is_active(&self) -> bool {
        false
    }
}

/// 手动注入事件源
///
/// 启动后通过 [`ManualCapture::emit`] 投递的记录会广播给订阅者，
/// 停止状态下投递的记录直接丢弃。
#[derive(Default)]
pub struct ManualCapture {
    subscribers: SubscriberRegistry,
    active: AtomicBool,
}

impl ManualCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// 投递一条记录，返回送达的订阅者数量
    pub fn emit(&self, record: TrafficRecord) -> usize {
        if !self.is_active() {
            tracing::trace!("事件源未启动，丢弃记录");
            return 0;
        }
        self.subscribers.broadcast(&record)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl CaptureSource for ManualCapture {
    fn subscribe(&self, callback: PacketCallback) -> SubscriptionToken {
        self.subscribers.subscribe(callback)
    }

    fn unsubscribe(&self, token: SubscriptionToken) {
        self.subscribers.unsubscribe(token);
    }

    fn start(&self) -> Result<(), CaptureError> {
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
