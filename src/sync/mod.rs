//! 批次上传模块
//!
//! 把客户端缓冲区的记录打包上传到采集端

mod client;
mod error;
mod types;

pub use client::SyncClient;
pub use error::SyncError;
pub use types::{AcceptanceReport, HealthReport};
