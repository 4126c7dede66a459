//! 集成测试：真实 WebSocket 客户端连接绑定在随机端口上的 Relay

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use server::app_state::AppState;
use server::config::SandboxConfig;
use server::routes::build_router;
use server::sandbox::{ExecutionSandbox, ShellRunner};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 启动 Relay：bare 运行时（宿主 bash），脚本写入临时目录
async fn start_test_server() -> (SocketAddr, tempfile::TempDir, CancellationToken) {
    let script_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let sandbox = ExecutionSandbox::new(SandboxConfig::bare(script_dir.path(), 2));
    let shutdown = CancellationToken::new();
    let state = AppState::with_runner(Arc::new(sandbox), ShellRunner::new("sh"), shutdown.clone());

    let app = build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let token = shutdown.clone();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(token.cancelled_owned())
            .await
            .unwrap();
    });

    (addr, script_dir, shutdown)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/", addr))
        .await
        .expect("Failed to connect");
    ws
}

async fn send(ws: &mut Client, frame: Value) {
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

/// 读取下一个文本帧并解析为 JSON，5 秒超时
async fn recv(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timed out waiting for frame")
            .expect("Stream ended")
            .expect("WebSocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// 短时间内不应收到任何帧
async fn expect_silence(ws: &mut Client) {
    let result = tokio::time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(result.is_err(), "Expected no frame, got {:?}", result);
}

async fn join(ws: &mut Client, room: &str, user: &str) {
    send(ws, json!({"type": "join", "roomId": room, "userId": user})).await;
    assert_eq!(recv(ws).await["type"], "userList");
    assert_eq!(recv(ws).await["content"], format!("{} joined", user));
}

#[tokio::test]
async fn test_join_fans_out_to_room_members() {
    let (addr, _dir, shutdown) = start_test_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    join(&mut alice, "pair", "alice").await;
    join(&mut bob, "pair", "bob").await;

    assert_eq!(
        recv(&mut alice).await,
        json!({"type": "userList", "roomId": "pair", "users": ["alice", "bob"]})
    );
    assert_eq!(recv(&mut alice).await["content"], "bob joined");

    let editor = json!({"type": "editor", "roomId": "pair", "userId": "bob", "content": "echo hi"});
    send(&mut bob, editor.clone()).await;
    assert_eq!(recv(&mut alice).await, editor);
    assert_eq!(recv(&mut bob).await, editor);

    shutdown.cancel();
}

#[tokio::test]
async fn test_run_from_unjoined_client_is_private() {
    let (addr, dir, shutdown) = start_test_server().await;
    let mut member = connect(addr).await;
    let mut loner = connect(addr).await;
    join(&mut member, "room", "member").await;

    send(&mut loner, json!({"type": "run", "roomId": "room", "code": "echo hello"})).await;
    assert_eq!(recv(&mut loner).await, json!({"type": "output", "content": "hello\n"}));
    expect_silence(&mut member).await;

    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    shutdown.cancel();
}

#[tokio::test]
async fn test_run_timeout_is_reported_to_room() {
    let (addr, _dir, shutdown) = start_test_server().await;
    let mut alice = connect(addr).await;
    join(&mut alice, "slow", "alice").await;

    let started = std::time::Instant::now();
    send(&mut alice, json!({"type": "run", "roomId": "slow", "code": "sleep 30"})).await;
    assert_eq!(
        recv(&mut alice).await,
        json!({
            "type": "output",
            "roomId": "slow",
            "content": "Session timed out: command took longer than 2 seconds"
        })
    );
    assert!(started.elapsed() < Duration::from_secs(5));

    shutdown.cancel();
}

#[tokio::test]
async fn test_frames_from_one_connection_are_handled_in_order() {
    let (addr, _dir, shutdown) = start_test_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    join(&mut alice, "fifo", "alice").await;
    join(&mut bob, "fifo", "bob").await;

    let editor = json!({"type": "editor", "roomId": "fifo", "userId": "alice", "content": "next"});
    send(&mut alice, json!({"type": "run", "roomId": "fifo", "code": "sleep 0.5; echo a"})).await;
    send(&mut alice, editor.clone()).await;

    assert_eq!(
        recv(&mut bob).await,
        json!({"type": "output", "roomId": "fifo", "content": "a\n"})
    );
    assert_eq!(recv(&mut bob).await, editor);

    shutdown.cancel();
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection_open() {
    let (addr, _dir, shutdown) = start_test_server().await;
    let mut alice = connect(addr).await;

    alice.send(Message::Text("{{{".to_string())).await.unwrap();
    send(&mut alice, json!({"type": "wave", "roomId": "x"})).await;
    expect_silence(&mut alice).await;

    join(&mut alice, "still-open", "alice").await;
    shutdown.cancel();
}

#[tokio::test]
async fn test_disconnect_updates_user_list() {
    let (addr, _dir, shutdown) = start_test_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    join(&mut alice, "r", "alice").await;
    join(&mut bob, "r", "bob").await;
    recv(&mut alice).await;
    recv(&mut alice).await;

    bob.close(None).await.unwrap();

    assert_eq!(
        recv(&mut alice).await,
        json!({"type": "userList", "roomId": "r", "users": ["alice"]})
    );
    shutdown.cancel();
}
