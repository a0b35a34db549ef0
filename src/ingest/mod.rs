//! 流量采集端模块
//!
//! 接收客户端上传的批次，内存存储并提供统计查询

pub mod aggregate;
mod error;
mod handlers;
pub mod model;
mod router;
pub mod store;
pub mod types;

pub use aggregate::{AggregateSnapshot, Aggregator, BatchSummary, DestinationCount};
pub use error::IngestError;
pub use model::{EntryId, LogEntry};
pub use router::{IngestState, create_app, create_ingest_router};
pub use store::LogStore;
