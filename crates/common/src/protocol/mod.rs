/// Relay 协议模块
/// 
/// 定义客户端与 Relay 之间的文本帧消息（每帧一个 JSON 对象）

pub mod error;
pub mod message;

pub use error::ProtocolError;
pub use message::*;
