/// 消息路由器
///
/// 连接级状态机：未加入 / 已加入(room_id)。
/// 解码入站帧，分派到成员管理、广播与代码执行，并把结果编码后发出

use common::protocol::{
    CursorMessage, EditorMessage, InputMessage, MembershipMessage, Message, RunMessage,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::connection_registry::OutboundSender;
use super::{Broadcaster, ConnectionRegistry, RoomDirectory};
use crate::sandbox::{CodeRunner, ExecutionResult, ShellRunner};

#[derive(Clone)]
pub struct MessageRouter {
    registry: ConnectionRegistry,
    rooms: RoomDirectory,
    broadcaster: Broadcaster,
    sandbox: Arc<dyn CodeRunner>,
    shell: ShellRunner,
}

impl MessageRouter {
    pub fn new(
        registry: ConnectionRegistry,
        rooms: RoomDirectory,
        sandbox: Arc<dyn CodeRunner>,
        shell: ShellRunner,
    ) -> Self {
        let broadcaster = Broadcaster::new(registry.clone(), rooms.clone());
        Self {
            registry,
            rooms,
            broadcaster,
            sandbox,
            shell,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomDirectory {
        &self.rooms
    }

    /// 新连接接入，返回连接身份
    pub async fn connect(&self, sender: OutboundSender) -> String {
        self.registry.register(sender).await
    }

    /// 处理一个入站文本帧；任何错误只影响本帧
    pub async fn handle_frame(&self, identity: &str, text: &str) {
        match Message::decode(text) {
            Ok(message) => self.dispatch(identity, message).await,
            Err(e) => {
                warn!(
                    category = e.category(),
                    "丢弃来自 {} 的帧: {}", identity, e
                );
            }
        }
    }

    /// 按消息类型分派
    pub async fn dispatch(&self, identity: &str, message: Message) {
        debug!("收到 {} 的 {} 消息 (room={:?})", identity, message.kind(), message.room_id());

        match message {
            Message::Join(m) => self.handle_join(identity, m).await,
            Message::Leave(m) => self.handle_leave(identity, m).await,
            Message::Input(m) => self.handle_input(m).await,
            Message::Run(m) => self.handle_run(identity, m).await,
            Message::Cursor(CursorMessage { ref room_id, .. })
            | Message::Editor(EditorMessage { ref room_id, .. }) => {
                self.broadcaster.broadcast_to_room(room_id, &message).await;
            }
            Message::Output(_) | Message::UserList(_) => {
                warn!("丢弃客户端 {} 发送的服务端消息类型: {}", identity, message.kind());
            }
        }
    }

    /// 连接关闭：先注销连接，再移出房间，最后通知剩余成员
    ///
    /// 注销之后 `set_room` 失败，并发中的 join 不会再记录新房间
    pub async fn disconnect(&self, identity: &str) {
        let Some(connection) = self.registry.unregister(identity).await else {
            return;
        };

        if let Some(ref room_id) = connection.current_room {
            self.rooms.leave(room_id, identity).await;
        }

        let online = chrono::Utc::now() - connection.connected_at;
        info!("{} 断开连接，在线 {} 秒", identity, online.num_seconds());

        if let Some(room_id) = connection.current_room {
            debug!("{} 离开房间 {}", connection.display_name, room_id);
            self.broadcast_user_list(&room_id).await;
        }
    }

    async fn handle_join(&self, identity: &str, m: MembershipMessage) {
        let Some(connection) = self.registry.lookup(identity).await else {
            return;
        };
        let display_name = m.display_name().to_string();

        // 切换房间时先离开原房间
        if let Some(previous) = connection.current_room.filter(|room| *room != m.room_id) {
            self.rooms.leave(&previous, identity).await;
            self.broadcast_user_list(&previous).await;
            self.broadcast_notice(&previous, format!("{} left", connection.display_name))
                .await;
        }

        self.registry.set_display_name(identity, display_name.as_str()).await;
        if !self.registry.set_room(identity, Some(m.room_id.clone())).await {
            return;
        }
        self.rooms.join(&m.room_id, identity).await;
        // 加入期间连接可能已被注销
        if self.registry.lookup(identity).await.is_none() {
            self.rooms.leave(&m.room_id, identity).await;
            return;
        }
        info!("{} ({}) 加入房间 {}", display_name, identity, m.room_id);

        self.broadcast_user_list(&m.room_id).await;
        self.broadcast_notice(&m.room_id, format!("{} joined", display_name))
            .await;
    }

    async fn handle_leave(&self, identity: &str, m: MembershipMessage) {
        self.rooms.leave(&m.room_id, identity).await;

        let in_room = self
            .registry
            .lookup(identity)
            .await
            .is_some_and(|c| c.current_room.as_deref() == Some(m.room_id.as_str()));
        if in_room {
            self.registry.set_room(identity, None).await;
        }
        info!("{} ({}) 离开房间 {}", m.display_name(), identity, m.room_id);

        self.broadcast_user_list(&m.room_id).await;
        self.broadcast_notice(&m.room_id, format!("{} left", m.display_name()))
            .await;
    }

    async fn handle_input(&self, m: InputMessage) {
        let content = match self.shell.run_command(&m.command).await {
            Ok(stdout) => stdout,
            Err(stderr) => stderr,
        };
        self.broadcaster
            .broadcast_to_room(&m.room_id, &Message::output(Some(m.room_id.clone()), content))
            .await;
    }

    async fn handle_run(&self, identity: &str, m: RunMessage) {
        // 执行放在独立任务中：连接关闭时执行照常完成并清理
        let sandbox = self.sandbox.clone();
        let code = m.code;
        let result = match tokio::spawn(async move { sandbox.execute(&code).await }).await {
            Ok(result) => result,
            Err(e) => ExecutionResult::LaunchFailed(e.to_string()),
        };

        self.deliver_to_sender(identity, result.into_content()).await;
    }

    /// 发送者已加入房间时广播到房间，否则只回复发送者
    async fn deliver_to_sender(&self, identity: &str, content: String) {
        let Some(connection) = self.registry.lookup(identity).await else {
            debug!("连接 {} 已关闭，丢弃执行结果", identity);
            return;
        };

        match connection.current_room {
            Some(room_id) => {
                let message = Message::output(Some(room_id.clone()), content);
                self.broadcaster.broadcast_to_room(&room_id, &message).await;
            }
            None => {
                self.broadcaster
                    .send_direct(identity, &Message::output(None, content))
                    .await;
            }
        }
    }

    async fn broadcast_user_list(&self, room_id: &str) {
        let members = self.rooms.members_of(room_id).await;
        if members.is_empty() {
            return;
        }
        let mut users = self.registry.display_names(&members).await;
        users.sort();
        self.broadcaster
            .broadcast_to_room(room_id, &Message::user_list(room_id, users))
            .await;
    }

    async fn broadcast_notice(&self, room_id: &str, content: String) {
        self.broadcaster
            .broadcast_to_room(room_id, &Message::output(Some(room_id.to_string()), content))
            .await;
    }
}
