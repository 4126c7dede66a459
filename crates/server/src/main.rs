/// Boxsh - Relay Server
///
/// 实时协作中继：房间广播、光标与编辑器同步、沙箱代码执行

use server::{app_state::AppState, config, routes};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 加载配置
    let cfg = config::Config::from_env()?;

    // 初始化日志（RUST_LOG 优先，否则使用 LOG_LEVEL）
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level))
        )
        .init();

    info!("🚀 启动 Boxsh Relay Server...");
    info!("✅ 配置加载成功");
    info!(
        "🧪 沙箱运行时: {:?}, 镜像: {}, 截止时间: {}s, 并发上限: {}",
        cfg.sandbox.runtime, cfg.sandbox.image, cfg.sandbox.deadline_secs, cfg.sandbox.max_concurrent
    );

    // 创建应用状态
    let shutdown = CancellationToken::new();
    let app_state = AppState::from_config(&cfg, shutdown.clone());

    // 构建应用路由
    let app = routes::build_router(app_state);

    // Ctrl-C 触发关闭
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("监听关闭信号失败: {}", e);
            return;
        }
        info!("🛑 收到关闭信号");
        signal_token.cancel();
    });

    // 启动服务器
    let addr: SocketAddr = format!("{}:{}", cfg.server_host, cfg.server_port).parse()?;
    info!("🎯 服务器监听在 ws://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("👋 服务器已关闭");
    Ok(())
}
