//! 采集端 API 路由

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    http::{Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::model::config::Config;

use super::aggregate::Aggregator;
use super::handlers::{analyze, get_logs, get_stats, health};
use super::store::LogStore;
use super::types::ErrorResponse;

/// 采集端共享状态
#[derive(Clone)]
pub struct IngestState {
    pub store: Arc<LogStore>,
    pub aggregator: Arc<Aggregator>,
    /// 进程启动时间，用于 /health 的 uptime
    pub started_at: Instant,
}

impl IngestState {
    pub fn new(store: Arc<LogStore>, top_limit: usize) -> Self {
        Self {
            aggregator: Arc::new(Aggregator::with_top_limit(store.clone(), top_limit)),
            store,
            started_at: Instant::now(),
        }
    }
}

/// 创建采集端 API 路由
///
/// # 端点
/// - `POST /analyze` - 接收批次
/// - `GET /logs` - 最近的日志条目
/// - `GET /stats` - 全量统计
pub fn create_ingest_router(state: IngestState) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/logs", get(get_logs))
        .route("/stats", get(get_stats))
        .with_state(state)
}

/// 创建完整应用：`/health` 位于根路径，API 挂在 `apiPrefix` 下
pub fn create_app(config: &Config, store: Arc<LogStore>) -> Router {
    let state = IngestState::new(store, config.top_destinations_limit);
    let api = create_ingest_router(state.clone());

    let app = Router::new().route("/health", get(health)).with_state(state);
    let mut app = match normalize_prefix(&config.api_prefix) {
        Some(prefix) => app.nest(&prefix, api),
        None => app.merge(api),
    };

    if config.cors_enabled {
        app = app.layer(cors_layer());
    }

    app.layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

/// 规范化路由前缀，空前缀或 "/" 返回 None（直接挂在根路径）
fn normalize_prefix(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{}", trimmed))
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// 处理器 panic 时返回 500，进程继续运行
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("请求处理发生 panic: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::internal_error("Internal server error")),
    )
        .into_response()
}
