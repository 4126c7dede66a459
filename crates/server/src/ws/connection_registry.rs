/// 连接注册表
///
/// 管理所有在线的客户端连接：身份、显示名、当前房间以及发送通道

use common::utils::generate_id;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// 发往连接的已序列化文本帧
pub type OutboundSender = mpsc::UnboundedSender<String>;

/// 客户端连接信息
#[derive(Debug, Clone)]
pub struct Connection {
    /// 连接身份（连接时生成）
    pub identity: String,

    /// 显示名，加入房间前等于身份
    pub display_name: String,

    /// 当前所在房间
    pub current_room: Option<String>,

    /// 发送消息的通道
    pub sender: OutboundSender,

    /// 连接时间
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

/// 连接注册表
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    /// 所有连接的映射：identity -> Connection
    connections: Arc<RwLock<HashMap<String, Connection>>>,
}

impl ConnectionRegistry {
    /// 创建新的连接注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册新连接，返回生成的身份
    pub async fn register(&self, sender: OutboundSender) -> String {
        let identity = generate_id();
        let connection = Connection {
            identity: identity.clone(),
            display_name: identity.clone(),
            current_room: None,
            sender,
            connected_at: chrono::Utc::now(),
        };

        let mut connections = self.connections.write().await;
        connections.insert(identity.clone(), connection);

        info!("连接已注册: {}", identity);
        identity
    }

    /// 查询连接（返回快照）
    pub async fn lookup(&self, identity: &str) -> Option<Connection> {
        let connections = self.connections.read().await;
        connections.get(identity).cloned()
    }

    /// 设置当前房间；连接不存在时返回 false
    pub async fn set_room(&self, identity: &str, room_id: Option<String>) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(identity) {
            Some(conn) => {
                debug!("连接 {} 房间变更: {:?} -> {:?}", identity, conn.current_room, room_id);
                conn.current_room = room_id;
                true
            }
            None => false,
        }
    }

    /// 设置显示名；连接不存在时返回 false
    pub async fn set_display_name(&self, identity: &str, display_name: impl Into<String>) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(identity) {
            Some(conn) => {
                conn.display_name = display_name.into();
                true
            }
            None => false,
        }
    }

    /// 注销连接，可重复调用；返回被移除的连接
    pub async fn unregister(&self, identity: &str) -> Option<Connection> {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(identity);
        if removed.is_some() {
            info!("连接已注销: {}", identity);
        }
        removed
    }

    /// 批量查询显示名，跳过已注销的身份
    pub async fn display_names(&self, identities: &[String]) -> Vec<String> {
        let connections = self.connections.read().await;
        identities
            .iter()
            .filter_map(|id| connections.get(id).map(|c| c.display_name.clone()))
            .collect()
    }

    /// 获取连接数量
    pub async fn count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }
}
