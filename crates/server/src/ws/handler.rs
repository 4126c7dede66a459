/// WebSocket 连接处理器
///
/// 每个连接一个发送任务和一个接收任务；接收任务按顺序处理本连接的帧

use axum::extract::ws::{Message as AxumWsMessage, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app_state::AppState;

/// WebSocket 升级处理器
pub async fn handle_relay_websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_relay_connection(socket, state))
}

/// 处理客户端 WebSocket 连接
async fn handle_relay_connection(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // 创建消息发送通道
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // 注册连接
    let router = state.router();
    let identity = router.connect(tx).await;
    info!("新的客户端连接: {}", identity);

    // 创建消息发送任务
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = ws_sender.send(AxumWsMessage::Text(frame)).await {
                error!("发送 WebSocket 消息失败: {}", e);
                break;
            }
        }
        let _ = ws_sender.close().await;
        debug!("消息发送任务结束");
    });

    // 创建消息接收任务
    let recv_router = router.clone();
    let recv_identity = identity.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(AxumWsMessage::Text(text)) => {
                    recv_router.handle_frame(&recv_identity, &text).await;
                }
                Ok(AxumWsMessage::Binary(data)) => {
                    debug!("忽略二进制消息: {} bytes", data.len());
                }
                Ok(AxumWsMessage::Close(_)) => {
                    debug!("客户端请求关闭连接");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("接收 WebSocket 消息错误: {}", e);
                    break;
                }
            }
        }
        debug!("消息接收任务结束");
    });

    // 等待任一任务完成；被中止的任务要等它真正结束后再清理
    tokio::select! {
        _ = &mut send_task => {
            debug!("发送任务已结束");
            recv_task.abort();
            let _ = recv_task.await;
        }
        _ = &mut recv_task => {
            debug!("接收任务已结束");
            send_task.abort();
            let _ = send_task.await;
        }
        _ = state.shutdown.cancelled() => {
            debug!("服务关闭，终止连接任务");
            recv_task.abort();
            send_task.abort();
            let _ = recv_task.await;
            let _ = send_task.await;
        }
    }

    // 清理：移出房间并注销
    router.disconnect(&identity).await;
    info!("客户端连接已关闭: {}", identity);
}
