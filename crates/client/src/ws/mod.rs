/// WebSocket 模块
/// 
/// 终端客户端与 Relay 之间的连接

pub mod client;

pub use client::RelayClient;
