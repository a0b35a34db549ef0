//! NetWhisper 流量遥测
//!
//! - `traffic`: 客户端事件源、有界缓冲区与监控会话
//! - `sync`: 批次上传客户端
//! - `ingest`: 采集端存储、聚合与 HTTP API

pub mod http_client;
pub mod ingest;
pub mod model;
pub mod sync;
pub mod traffic;
