/// Relay 消息定义

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ProtocolError;

/// 未提供 userId 时使用的显示名
pub const DEFAULT_USER_NAME: &str = "Anonymous";

/// 客户端可以发送的消息类型（`output` 与 `userList` 只由 Relay 发出，但也能被解码）
pub const KNOWN_TYPES: &[&str] = &[
    "join", "leave", "input", "run", "output", "cursor", "editor", "userList",
];

/// Relay 消息
///
/// 以 `type` 字段为标签的封闭变体集合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// 加入房间
    Join(MembershipMessage),
    /// 离开房间
    Leave(MembershipMessage),
    /// 旧版 shell 命令（不经过沙箱）
    Input(InputMessage),
    /// 提交到沙箱执行的代码
    Run(RunMessage),
    /// 执行结果或系统通知
    Output(OutputMessage),
    /// 光标位置
    Cursor(CursorMessage),
    /// 编辑器全文
    Editor(EditorMessage),
    /// 房间成员列表（仅 Relay 发出）
    UserList(UserListMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipMessage {
    pub room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl MembershipMessage {
    /// 显示名，缺省为 "Anonymous"
    pub fn display_name(&self) -> &str {
        self.user_id.as_deref().unwrap_or(DEFAULT_USER_NAME)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputMessage {
    pub room_id: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMessage {
    pub room_id: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputMessage {
    /// 直接回复给未加入房间的发送者时为空
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// 光标位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorMessage {
    pub room_id: String,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// 发送方附带的其它字段，原样转发
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorMessage {
    pub room_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// 发送方附带的其它字段，原样转发
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListMessage {
    pub room_id: String,
    pub users: Vec<String>,
}

impl Message {
    /// 创建加入消息
    pub fn join(room_id: impl Into<String>, user_id: Option<String>) -> Self {
        Self::Join(MembershipMessage {
            room_id: room_id.into(),
            user_id,
        })
    }

    /// 创建离开消息
    pub fn leave(room_id: impl Into<String>, user_id: Option<String>) -> Self {
        Self::Leave(MembershipMessage {
            room_id: room_id.into(),
            user_id,
        })
    }

    /// 创建输出消息
    pub fn output(room_id: Option<String>, content: impl Into<String>) -> Self {
        Self::Output(OutputMessage {
            room_id,
            content: content.into(),
            user_id: None,
        })
    }

    /// 创建成员列表消息
    pub fn user_list(room_id: impl Into<String>, users: Vec<String>) -> Self {
        Self::UserList(UserListMessage {
            room_id: room_id.into(),
            users,
        })
    }

    /// 消息类型名（与线上 `type` 字段一致）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Leave(_) => "leave",
            Self::Input(_) => "input",
            Self::Run(_) => "run",
            Self::Output(_) => "output",
            Self::Cursor(_) => "cursor",
            Self::Editor(_) => "editor",
            Self::UserList(_) => "userList",
        }
    }

    /// 消息所属房间
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::Join(m) | Self::Leave(m) => Some(&m.room_id),
            Self::Input(m) => Some(&m.room_id),
            Self::Run(m) => Some(&m.room_id),
            Self::Output(m) => m.room_id.as_deref(),
            Self::Cursor(m) => Some(&m.room_id),
            Self::Editor(m) => Some(&m.room_id),
            Self::UserList(m) => Some(&m.room_id),
        }
    }

    /// 从文本帧解码
    ///
    /// 先按通用 JSON 解析以区分三类错误，再按标签解码为具体变体
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::Malformed("缺少字符串类型的 type 字段".to_string()))?;

        if !KNOWN_TYPES.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_string()));
        }
        let kind = kind.to_string();

        serde_json::from_value(value).map_err(|e| ProtocolError::InvalidFields {
            kind,
            reason: e.to_string(),
        })
    }

    /// 编码为文本帧
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
