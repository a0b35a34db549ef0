use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::aggregate::DEFAULT_TOP_LIMIT;
use crate::traffic::buffer::DEFAULT_CAPACITY;

/// NetWhisper 应用配置
///
/// 采集端（serve）和上传端（push/health）共用一个配置文件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// 采集端 API 路由前缀（`/health` 始终位于根路径）
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// 是否允许跨域请求
    #[serde(default = "default_cors_enabled")]
    pub cors_enabled: bool,

    /// /stats 排行榜长度
    #[serde(default = "default_top_destinations_limit")]
    pub top_destinations_limit: usize,

    /// 客户端缓冲区容量
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// 上传目标地址（采集端 API 前缀）
    #[serde(default = "default_sync_endpoint")]
    pub sync_endpoint: String,

    /// 上传超时（秒）
    #[serde(default = "default_sync_timeout_secs")]
    pub sync_timeout_secs: u64,

    /// 上传成功后是否清空缓冲区
    #[serde(default)]
    pub clear_buffer_on_sync: bool,

    /// HTTP 代理地址（可选）
    /// 支持格式: http://host:port, https://host:port, socks5://host:port
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,

    /// 配置文件路径（运行时元数据，不写入 JSON）
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_cors_enabled() -> bool {
    true
}

fn default_top_destinations_limit() -> usize {
    DEFAULT_TOP_LIMIT
}

fn default_buffer_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_sync_endpoint() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

fn default_sync_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_prefix: default_api_prefix(),
            cors_enabled: default_cors_enabled(),
            top_destinations_limit: default_top_destinations_limit(),
            buffer_capacity: default_buffer_capacity(),
            sync_endpoint: default_sync_endpoint(),
            sync_timeout_secs: default_sync_timeout_secs(),
            clear_buffer_on_sync: false,
            proxy_url: None,
            config_path: None,
        }
    }
}

impl Config {
    /// 获取默认配置文件路径
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// 监听地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 从文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            // 配置文件不存在，返回默认配置
            let mut config = Self::default();
            config.config_path = Some(path.to_path_buf());
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// 获取配置文件路径（如果有）
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 将当前配置写回原始配置文件
    pub fn save(&self) -> anyhow::Result<()> {
        let path = self
            .config_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("配置文件路径未知，无法保存配置"))?;

        let content = serde_json::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, content)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_returns_defaults() {
        let path = std::env::temp_dir()
            .join(format!("netwhisper-missing-{}.json", uuid::Uuid::new_v4()));
        let config = Config::load(&path).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.buffer_capacity, 100);
        assert_eq!(config.top_destinations_limit, 10);
        assert_eq!(config.sync_timeout_secs, 10);
        assert_eq!(config.config_path(), Some(path.as_path()));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{"port": 9090, "corsEnabled": false, "syncEndpoint": "http://collector:9090/api"}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.port, 9090);
        assert!(!config.cors_enabled);
        assert_eq!(config.sync_endpoint, "http://collector:9090/api");
        assert_eq!(config.host, "127.0.0.1");
        assert!(!config.clear_buffer_on_sync);
        assert_eq!(config.bind_addr(), "127.0.0.1:9090");
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir()
            .join(format!("netwhisper-config-{}.json", uuid::Uuid::new_v4()));
        let mut config = Config::load(&path).unwrap();
        config.port = 18080;
        config.proxy_url = Some("socks5://127.0.0.1:1080".to_string());
        config.save().unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.port, 18080);
        assert_eq!(reloaded.proxy_url.as_deref(), Some("socks5://127.0.0.1:1080"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_save_without_path_fails() {
        assert!(Config::default().save().is_err());
    }
}
