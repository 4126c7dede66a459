/// WebSocket 客户端
///
/// 连接 Relay、加入房间，把终端输入转换为协议消息，把房间消息打印到终端

use common::protocol::{CursorMessage, EditorMessage, InputMessage, Message, RunMessage};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

use crate::console::{parse_line, render, ConsoleCommand};

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    WsMessage,
>;

/// 一次连接结束的原因
enum SessionEnd {
    /// 用户输入 /quit 或终端输入结束
    Quit,
    /// 服务端关闭了连接
    Closed,
}

/// 终端客户端
#[derive(Clone)]
pub struct RelayClient {
    /// Relay 地址
    server_url: String,

    /// 默认房间
    room_id: String,

    /// 显示名
    user_name: String,

    /// 重连间隔（秒）
    reconnect_interval: u64,
}

impl RelayClient {
    pub fn new(
        server_url: impl Into<String>,
        room_id: impl Into<String>,
        user_name: impl Into<String>,
        reconnect_interval: u64,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            room_id: room_id.into(),
            user_name: user_name.into(),
            reconnect_interval,
        }
    }

    /// 启动客户端（连接并保持）
    pub async fn run(&self) -> anyhow::Result<()> {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<ConsoleCommand>();
        tokio::spawn(read_console(cmd_tx));

        loop {
            info!("尝试连接到 Relay: {}", self.server_url);

            match self.connect_and_run(&mut cmd_rx).await {
                Ok(SessionEnd::Quit) => {
                    info!("👋 已退出");
                    return Ok(());
                }
                Ok(SessionEnd::Closed) => {
                    info!("连接已被服务端关闭");
                }
                Err(e) => {
                    error!("连接错误: {}", e);
                }
            }

            // 等待后重连
            warn!("{}秒后重新连接...", self.reconnect_interval);
            tokio::time::sleep(Duration::from_secs(self.reconnect_interval)).await;
        }
    }

    /// 连接并运行，直到连接断开或用户退出
    async fn connect_and_run(
        &self,
        commands: &mut mpsc::UnboundedReceiver<ConsoleCommand>,
    ) -> anyhow::Result<SessionEnd> {
        let (ws_stream, _) = connect_async(&self.server_url).await?;
        info!("✅ WebSocket 连接成功");

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        // 连接（或重连）后加入默认房间
        let mut current_room = Some(self.room_id.clone());
        send_message(&mut ws_sender, &Message::join(self.room_id.clone(), Some(self.user_name.clone()))).await?;

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        self.leave_if_joined(&mut ws_sender, &current_room).await;
                        return Ok(SessionEnd::Quit);
                    };
                    if command == ConsoleCommand::Quit {
                        self.leave_if_joined(&mut ws_sender, &current_room).await;
                        let _ = ws_sender.close().await;
                        return Ok(SessionEnd::Quit);
                    }
                    if let Some(message) = self.to_message(command, &mut current_room).await {
                        send_message(&mut ws_sender, &message).await?;
                    }
                }
                frame = ws_receiver.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            match Message::decode(&text) {
                                Ok(message) => {
                                    if let Some(line) = render(&message, current_room.as_deref()) {
                                        println!("{}", line.trim_end());
                                    }
                                }
                                Err(e) => warn!("解析 Relay 消息失败: {}", e),
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => return Ok(SessionEnd::Closed),
                        Some(Ok(_)) => debug!("收到其他类型消息，忽略"),
                        Some(Err(e)) => return Err(e.into()),
                    }
                }
            }
        }
    }

    /// 将终端操作转换为协议消息；本地错误直接打印
    async fn to_message(
        &self,
        command: ConsoleCommand,
        current_room: &mut Option<String>,
    ) -> Option<Message> {
        let room_id = current_room.clone().unwrap_or_else(|| self.room_id.clone());
        let user_id = Some(self.user_name.clone());

        match command {
            ConsoleCommand::Run(path) => match tokio::fs::read_to_string(&path).await {
                Ok(code) => Some(Message::Run(RunMessage { room_id, code, user_id })),
                Err(e) => {
                    eprintln!("无法读取 {}: {}", path.display(), e);
                    None
                }
            },
            ConsoleCommand::Edit(path) => match tokio::fs::read_to_string(&path).await {
                Ok(content) => Some(Message::Editor(EditorMessage {
                    room_id,
                    content,
                    user_id,
                    extra: Default::default(),
                })),
                Err(e) => {
                    eprintln!("无法读取 {}: {}", path.display(), e);
                    None
                }
            },
            ConsoleCommand::Cursor(position) => Some(Message::Cursor(CursorMessage {
                room_id,
                position,
                user_id,
                extra: Default::default(),
            })),
            ConsoleCommand::Join(room) => {
                let room = room.unwrap_or_else(|| self.room_id.clone());
                *current_room = Some(room.clone());
                Some(Message::join(room, user_id))
            }
            ConsoleCommand::Leave => {
                let room = current_room.take()?;
                Some(Message::leave(room, user_id))
            }
            ConsoleCommand::Input(command) => Some(Message::Input(InputMessage {
                room_id,
                command,
                user_id,
            })),
            ConsoleCommand::Quit => None,
        }
    }

    async fn leave_if_joined(&self, sender: &mut WsSink, current_room: &Option<String>) {
        if let Some(room) = current_room {
            let leave = Message::leave(room.clone(), Some(self.user_name.clone()));
            if let Err(e) = send_message(sender, &leave).await {
                debug!("发送离开消息失败: {}", e);
            }
        }
    }
}

/// 发送消息（辅助方法）
async fn send_message(sender: &mut WsSink, message: &Message) -> common::Result<()> {
    let json = message.encode()?;
    sender
        .send(WsMessage::Text(json))
        .await
        .map_err(|e| common::Error::Transport(e.to_string()))?;
    Ok(())
}

/// 逐行读取终端输入
async fn read_console(tx: mpsc::UnboundedSender<ConsoleCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_line(&line) {
                Ok(Some(command)) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => eprintln!("{}", e),
            },
            Ok(None) => break,
            Err(e) => {
                error!("读取终端输入失败: {}", e);
                break;
            }
        }
    }
    debug!("终端输入结束");
}
