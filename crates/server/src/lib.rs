/// Boxsh - Relay Server
/// 
/// 房间广播核心与沙箱代码执行

pub mod app_state;
pub mod config;
pub mod routes;
pub mod sandbox;
pub mod ws;
