//! 采集端 API 处理器

use axum::{
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;

use crate::traffic::Batch;

use super::aggregate::summarize_batch;
use super::router::IngestState;
use super::store::DEFAULT_LIST_LIMIT;
use super::types::{
    AnalyzeRequest, AnalyzeResponse, ErrorResponse, HealthResponse, LogsQuery, LogsResponse,
};

/// POST /api/analyze
/// 接收一个批次并返回该批次的摘要
pub async fn analyze(
    State(state): State<IngestState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!("无效的批次请求体: {}", rejection.body_text());
            return bad_request(format!("Invalid packet data: {}", rejection.body_text()));
        }
    };

    let Some(packets) = request.packets else {
        return bad_request("Invalid packet data: `packets` must be an array");
    };

    let client_timestamp = request
        .timestamp
        .unwrap_or_else(|| Utc::now().timestamp_millis());
    let batch = Batch::new(packets, client_timestamp);

    tracing::info!(
        packets = batch.len(),
        client_timestamp = batch.client_timestamp,
        "收到流量批次"
    );

    match state.store.ingest(batch) {
        Ok(entry) => {
            let summary = summarize_batch(&entry.batch, entry.received_at);
            tracing::info!(
                id = %entry.id,
                bytes = summary.total_bytes,
                unique_destinations = summary.unique_destinations,
                "批次分析完成"
            );
            Json(AnalyzeResponse {
                success: true,
                id: entry.id.to_string(),
                summary,
            })
            .into_response()
        }
        Err(e) => {
            tracing::warn!("拒绝批次: {}", e);
            (e.status_code(), Json(e.into_response())).into_response()
        }
    }
}

/// GET /api/logs?limit=N
/// 最近的 N 条日志，最新在前
pub async fn get_logs(
    State(state): State<IngestState>,
    Query(query): Query<LogsQuery>,
) -> impl IntoResponse {
    let limit = parse_limit(query.limit.as_deref());
    Json(LogsResponse {
        total: state.store.len(),
        logs: state.store.list(limit),
    })
}

/// GET /api/stats
pub async fn get_stats(State(state): State<IngestState>) -> Response {
    let aggregator = state.aggregator.clone();
    match tokio::task::spawn_blocking(move || aggregator.summarize()).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            tracing::error!("计算流量统计失败: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal_error(format!("统计失败: {}", e))),
            )
                .into_response()
        }
    }
}

/// GET /health
pub async fn health(State(state): State<IngestState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime: state.started_at.elapsed().as_secs_f64(),
    })
}

/// 解析 limit：缺失或无法解析时取默认值，负数按 0 处理
fn parse_limit(raw: Option<&str>) -> usize {
    match raw.map(str::trim).and_then(|s| s.parse::<i64>().ok()) {
        Some(n) if n < 0 => 0,
        Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        None => DEFAULT_LIST_LIMIT,
    }
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::invalid_request(message)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit(None), DEFAULT_LIST_LIMIT);
        assert_eq!(parse_limit(Some("abc")), DEFAULT_LIST_LIMIT);
        assert_eq!(parse_limit(Some("")), DEFAULT_LIST_LIMIT);
        assert_eq!(parse_limit(Some("3")), 3);
        assert_eq!(parse_limit(Some(" 25 ")), 25);
        assert_eq!(parse_limit(Some("0")), 0);
        assert_eq!(parse_limit(Some("-7")), 0);
    }
}
