/// WebSocket 模块
/// 
/// 连接注册、房间成员管理、消息路由与广播

pub mod broadcaster;
pub mod connection_registry;
pub mod handler;
pub mod room_directory;
pub mod router;

pub use broadcaster::Broadcaster;
pub use connection_registry::{Connection, ConnectionRegistry};
pub use handler::handle_relay_websocket;
pub use room_directory::RoomDirectory;
pub use router::MessageRouter;
