/// 配置管理

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub relay_ws_url: String,
    pub room_id: String,
    pub user_name: String,
    pub reconnect_interval: u64,
    pub log_level: String,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> anyhow::Result<Self> {
        let relay_ws_url = match std::env::var("RELAY_WS_URL") {
            Ok(url) => url,
            Err(_) => {
                let host = std::env::var("RELAY_HOST")
                    .unwrap_or_else(|_| "localhost".to_string());
                let port: u16 = std::env::var("RELAY_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()?;
                let secure = std::env::var("RELAY_SECURE")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false);
                relay_url(&host, port, secure)
            }
        };

        let room_id = std::env::var("ROOM_ID")
            .unwrap_or_else(|_| "lobby".to_string());

        let user_name = std::env::var("USER_NAME")
            .unwrap_or_else(|_| common::protocol::DEFAULT_USER_NAME.to_string());

        let reconnect_interval = std::env::var("RECONNECT_INTERVAL")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?;

        let log_level = std::env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            relay_ws_url,
            room_id,
            user_name,
            reconnect_interval,
            log_level,
        })
    }
}

/// 按协议（安全 / 明文）拼接 Relay 地址
pub fn relay_url(host: &str, port: u16, secure: bool) -> String {
    let scheme = if secure { "wss" } else { "ws" };
    format!("{}://{}:{}", scheme, host, port)
}
