use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use netwhisper::ingest::{LogStore, create_app};
use netwhisper::model::config::Config;
use netwhisper::sync::SyncClient;
use netwhisper::traffic::{ManualCapture, MonitorSession, PacketBuffer, TrafficRecord};

/// 网络流量遥测：采集端服务与批次上传工具
#[derive(Parser)]
#[command(name = "netwhisper", version, about)]
struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = Config::default_config_path())]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// 启动采集端 HTTP 服务（默认）
    Serve {
        /// 覆盖配置中的监听地址
        #[arg(long)]
        host: Option<String>,
        /// 覆盖配置中的监听端口
        #[arg(long)]
        port: Option<u16>,
    },
    /// 读取 JSON 记录文件，经缓冲区上传到采集端
    Push {
        /// 形如 [{"sourceIp","destIp","size","timestamp"}] 的文件
        #[arg(short, long)]
        file: PathBuf,
    },
    /// 检查采集端健康状态
    Health,
    /// 把当前生效的配置（含默认值）写入配置文件
    Init {
        /// 覆盖已存在的配置文件
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::load(&args.config)
        .with_context(|| format!("加载配置失败: {}", args.config.display()))?;

    match args.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
        Command::Push { file } => push(config, file).await,
        Command::Health => health(config).await,
        Command::Init { force } => init(config, force),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    // 进程级存储：重启即丢弃
    let store = Arc::new(LogStore::new());
    let app = create_app(&config, store);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("监听 {} 失败", addr))?;

    tracing::info!("采集端已启动: http://{}", addr);
    tracing::info!("  POST {}/analyze  - 接收流量批次", config.api_prefix);
    tracing::info!("  GET  {}/logs     - 查看日志", config.api_prefix);
    tracing::info!("  GET  {}/stats    - 统计信息", config.api_prefix);
    tracing::info!("  GET  /health          - 健康检查");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP 服务异常退出")?;

    tracing::info!("采集端已停止");
    Ok(())
}

async fn push(config: Config, file: PathBuf) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("读取记录文件失败: {}", file.display()))?;
    let records: Vec<TrafficRecord> = serde_json::from_str(&content)
        .with_context(|| format!("解析记录文件失败: {}", file.display()))?;

    if records.len() > config.buffer_capacity {
        tracing::warn!(
            "记录数 {} 超过缓冲区容量 {}，只上传最近的 {} 条",
            records.len(),
            config.buffer_capacity,
            config.buffer_capacity
        );
    }

    let source = Arc::new(ManualCapture::new());
    let buffer = Arc::new(PacketBuffer::with_capacity(config.buffer_capacity));
    let client = SyncClient::from_config(&config)?;
    let session = MonitorSession::new(source.clone(), buffer, client)
        .with_clear_on_sync(config.clear_buffer_on_sync);

    session.start()?;
    for record in records {
        source.emit(record);
    }
    session.stop();

    let report = session
        .sync()
        .await
        .with_context(|| format!("上传到 {} 失败", config.sync_endpoint))?;

    println!("{}", serde_json::to_string_pretty(&report.summary)?);
    Ok(())
}

async fn health(config: Config) -> anyhow::Result<()> {
    let client = SyncClient::from_config(&config)?;
    let report = client
        .health()
        .await
        .with_context(|| format!("采集端 {} 不可用", config.sync_endpoint))?;

    println!("status: {}, uptime: {:.1}s", report.status, report.uptime);
    if !report.is_ok() {
        anyhow::bail!("采集端状态异常: {}", report.status);
    }
    Ok(())
}

fn init(config: Config, force: bool) -> anyhow::Result<()> {
    let path = config
        .config_path()
        .ok_or_else(|| anyhow::anyhow!("配置文件路径未知"))?;
    if path.exists() && !force {
        anyhow::bail!("配置文件已存在: {}（使用 --force 覆盖）", path.display());
    }

    config.save()?;
    tracing::info!("配置已写入: {}", path.display());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("注册退出信号失败: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("收到退出信号，正在关闭");
}
