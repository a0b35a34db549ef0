//! 客户端流量采集模块
//!
//! 事件源 → 有界缓冲区 → 监控会话（按需上传）

pub mod buffer;
pub mod record;
pub mod session;
pub mod source;

pub use buffer::{PacketBuffer, SyncMark};
pub use record::{Batch, RecordViolation, TrafficRecord};
pub use session::{MonitorSession, SessionStatus};
pub use source::{CaptureError, CaptureSource, LiveCapture, ManualCapture, SubscriptionToken};
