//! 批次上传客户端

use chrono::Utc;
use reqwest::{Client, Url};

use crate::http_client::build_client;
use crate::model::config::Config;
use crate::traffic::{Batch, TrafficRecord};

use super::error::SyncError;
use super::types::{AcceptanceReport, HealthReport};

/// 上传客户端
///
/// 把记录打包成批次 POST 到 `{endpoint}/analyze`。
/// 不做重试，不做本地统计，统计只由服务端聚合器负责。
#[derive(Debug, Clone)]
pub struct SyncClient {
    client: Client,
    endpoint: String,
    timeout_secs: u64,
}

impl SyncClient {
    /// 创建客户端
    ///
    /// `endpoint` 为采集端 API 前缀，例如 `http://127.0.0.1:8080/api`
    pub fn new(
        endpoint: impl Into<String>,
        timeout_secs: u64,
        proxy_url: Option<&str>,
    ) -> anyhow::Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Url::parse(&endpoint)
            .map_err(|e| anyhow::anyhow!("无效的采集端地址 {}: {}", endpoint, e))?;
        let timeout_secs = timeout_secs.max(1);
        let client = build_client(proxy_url, timeout_secs)?;
        Ok(Self {
            client,
            endpoint,
            timeout_secs,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            config.sync_endpoint.clone(),
            config.sync_timeout_secs,
            config.proxy_url.as_deref(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 上传一批记录（应为抓包顺序）
    ///
    /// 失败时不修改调用方的任何状态。
    pub async fn sync(&self, records: &[TrafficRecord]) -> Result<AcceptanceReport, SyncError> {
        if records.is_empty() {
            return Err(SyncError::EmptyBatch);
        }

        let batch = Batch::assemble(records);
        let url = format!("{}/analyze", self.endpoint);

        tracing::debug!(
            url = %url,
            packets = batch.len(),
            client_timestamp = batch.client_timestamp,
            "上传流量批次"
        );

        let response = self
            .client
            .post(&url)
            .json(&batch)
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::from_reqwest(e, self.timeout_secs))?;

        if !status.is_success() {
            tracing::warn!("批次上传失败: HTTP {}", status);
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let report: AcceptanceReport =
            serde_json::from_str(&body).map_err(|e| SyncError::Decode(e.to_string()))?;

        if !report.success {
            tracing::warn!("采集端未接受批次: {}", body);
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            packets = report.summary.total_packets,
            bytes = report.summary.total_bytes,
            elapsed_ms = (Utc::now().timestamp_millis() - batch.client_timestamp).max(0),
            "批次上传成功"
        );

        Ok(report)
    }

    /// 探测采集端健康状态（`/health` 位于服务根路径）
    pub async fn health(&self) -> Result<HealthReport, SyncError> {
        let url = Url::parse(&self.endpoint)
            .and_then(|base| base.join("/health"))
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<HealthReport>()
            .await
            .map_err(|e| SyncError::from_reqwest(e, self.timeout_secs))
    }
}
