/// 终端输入解析与房间消息渲染

use common::protocol::{Message, Position};
use std::path::PathBuf;

/// 一行终端输入对应的操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// 读取文件并提交到沙箱执行
    Run(PathBuf),
    /// 读取文件并替换房间编辑器内容
    Edit(PathBuf),
    /// 广播光标位置
    Cursor(Position),
    /// 加入房间（缺省为配置的房间）
    Join(Option<String>),
    Leave,
    Quit,
    /// 旧版 shell 命令
    Input(String),
}

/// 解析一行输入；空行返回 None
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(ConsoleCommand::Input(line.to_string())));
    };

    let mut parts = rest.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    let parsed = match (command, args.as_slice()) {
        ("run", [path]) => ConsoleCommand::Run(PathBuf::from(path)),
        ("edit", [path]) => ConsoleCommand::Edit(PathBuf::from(path)),
        ("cursor", [line, column]) => {
            let line = line.parse().map_err(|_| format!("无效的行号: {}", line))?;
            let column = column.parse().map_err(|_| format!("无效的列号: {}", column))?;
            ConsoleCommand::Cursor(Position { line, column })
        }
        ("join", []) => ConsoleCommand::Join(None),
        ("join", [room]) => ConsoleCommand::Join(Some(room.to_string())),
        ("leave", []) => ConsoleCommand::Leave,
        ("quit", []) => ConsoleCommand::Quit,
        _ => return Err(format!("无法识别的命令: /{}", rest)),
    };
    Ok(Some(parsed))
}

/// 渲染收到的消息；不需要展示时返回 None
pub fn render(message: &Message, current_room: Option<&str>) -> Option<String> {
    match message {
        Message::Output(m) => Some(m.content.clone()),
        Message::UserList(m) if Some(m.room_id.as_str()) == current_room => {
            if m.users.is_empty() {
                Some("👥 No participants yet".to_string())
            } else {
                Some(format!("👥 {}", m.users.join(", ")))
            }
        }
        Message::Editor(m) if Some(m.room_id.as_str()) == current_room => Some(format!(
            "✏️ {} replaced the editor content ({} bytes)",
            m.user_id.as_deref().unwrap_or(common::protocol::DEFAULT_USER_NAME),
            m.content.len()
        )),
        _ => None,
    }
}
