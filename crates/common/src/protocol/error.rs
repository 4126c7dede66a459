/// 协议错误定义

use thiserror::Error;

/// 帧解析错误
///
/// 三类错误都只影响当前帧：记录日志后丢弃，连接保持打开
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 不是合法的 JSON 对象，或缺少字符串类型的 `type` 字段
    #[error("无法解析的帧: {0}")]
    Malformed(String),

    /// 结构合法但 `type` 不受支持
    #[error("未知的消息类型: {0}")]
    UnknownType(String),

    /// 已知类型但必需字段缺失或类型不符
    #[error("消息 {kind} 字段无效: {reason}")]
    InvalidFields { kind: String, reason: String },
}

impl ProtocolError {
    /// 错误分类标签，用于日志字段
    pub fn category(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::UnknownType(_) => "unknown_type",
            Self::InvalidFields { .. } => "invalid_fields",
        }
    }
}
