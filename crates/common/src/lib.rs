/// Boxsh - 公共库
/// 
/// 提供 Relay Server 和终端客户端共享的协议类型、错误处理、工具函数等

pub mod errors;
pub mod protocol;
pub mod utils;

// 重新导出常用类型
pub use errors::{Error, Result};
pub use protocol::{Message, ProtocolError};
