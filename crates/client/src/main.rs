/// Boxsh - 终端客户端
/// 
/// 加入房间，接收输出与成员变化，提交命令和脚本

mod config;
mod console;
mod ws;

use tracing::info;
use ws::RelayClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenvy::dotenv().ok();
    let cfg = config::Config::from_env()?;

    // 初始化日志，输出到 stderr，stdout 留给房间内容
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level))
        )
        .init();

    info!("🎯 连接到 Relay: {}", cfg.relay_ws_url);
    info!("📌 房间: {}, 用户: {}", cfg.room_id, cfg.user_name);

    let client = RelayClient::new(
        cfg.relay_ws_url.clone(),
        cfg.room_id.clone(),
        cfg.user_name.clone(),
        cfg.reconnect_interval,
    );

    // 运行客户端（断线后自动重连，/quit 退出）
    client.run().await
}
