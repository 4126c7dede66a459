/// 房间目录
///
/// 维护 room_id -> 成员身份集合；成员为空的房间会立即删除

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 房间目录
#[derive(Clone, Default)]
pub struct RoomDirectory {
    rooms: Arc<RwLock<HashMap<String, HashSet<String>>>>,
}

impl RoomDirectory {
    /// 创建新的房间目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入房间，房间不存在时创建；重复加入无副作用
    pub async fn join(&self, room_id: &str, identity: &str) {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(room_id.to_string()).or_insert_with(|| {
            info!("房间已创建: {}", room_id);
            HashSet::new()
        });
        if members.insert(identity.to_string()) {
            debug!("{} 加入房间 {}（{} 人）", identity, room_id, members.len());
        }
    }

    /// 离开房间；最后一名成员离开后删除房间
    pub async fn leave(&self, room_id: &str, identity: &str) {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(room_id) else {
            return;
        };
        if members.remove(identity) {
            debug!("{} 离开房间 {}（剩余 {} 人）", identity, room_id, members.len());
        }
        if members.is_empty() {
            rooms.remove(room_id);
            info!("房间已删除: {}", room_id);
        }
    }

    /// 房间成员；房间不存在时返回空列表
    pub async fn members_of(&self, room_id: &str) -> Vec<String> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 房间是否存在（存在即至少有一名成员）
    pub async fn contains(&self, room_id: &str) -> bool {
        let rooms = self.rooms.read().await;
        rooms.contains_key(room_id)
    }

    /// 获取房间数量
    pub async fn room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }
}
