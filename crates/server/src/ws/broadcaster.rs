/// 消息广播器
///
/// 向房间所有成员或单个连接投递消息；单个接收者失败不影响其它接收者

use common::Message;
use tracing::{debug, error, warn};

use super::{ConnectionRegistry, RoomDirectory};

#[derive(Clone)]
pub struct Broadcaster {
    registry: ConnectionRegistry,
    rooms: RoomDirectory,
}

impl Broadcaster {
    pub fn new(registry: ConnectionRegistry, rooms: RoomDirectory) -> Self {
        Self { registry, rooms }
    }

    /// 向房间广播，返回成功投递的连接数
    pub async fn broadcast_to_room(&self, room_id: &str, message: &Message) -> usize {
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!("序列化 {} 消息失败: {}", message.kind(), e);
                return 0;
            }
        };

        let members = self.rooms.members_of(room_id).await;
        let mut count = 0;

        for identity in &members {
            let Some(conn) = self.registry.lookup(identity).await else {
                debug!("跳过已注销的成员: {}", identity);
                continue;
            };
            if let Err(e) = conn.sender.send(frame.clone()) {
                warn!("向连接 {} 发送消息失败: {}", identity, e);
            } else {
                count += 1;
            }
        }

        debug!("{} 消息已广播到房间 {} 的 {}/{} 个连接", message.kind(), room_id, count, members.len());
        count
    }

    /// 直接发送给单个连接；连接不存在或已关闭时静默返回 false
    pub async fn send_direct(&self, identity: &str, message: &Message) -> bool {
        let Some(conn) = self.registry.lookup(identity).await else {
            debug!("连接 {} 已不存在，丢弃 {} 消息", identity, message.kind());
            return false;
        };

        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!("序列化 {} 消息失败: {}", message.kind(), e);
                return false;
            }
        };

        match conn.sender.send(frame) {
            Ok(()) => true,
            Err(e) => {
                warn!("向连接 {} 发送消息失败: {}", identity, e);
                false
            }
        }
    }
}
