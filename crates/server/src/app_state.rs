/// 应用全局状态

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::sandbox::{CodeRunner, ExecutionSandbox, ShellRunner};
use crate::ws::{ConnectionRegistry, MessageRouter, RoomDirectory};

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// 消息路由器（持有连接注册表与房间目录）
    pub router: MessageRouter,
    /// 关闭信号，触发后所有连接任务退出
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(router: MessageRouter, shutdown: CancellationToken) -> Self {
        Self { router, shutdown }
    }

    /// 按配置组装全部组件
    pub fn from_config(cfg: &Config, shutdown: CancellationToken) -> Self {
        let sandbox: Arc<dyn CodeRunner> = Arc::new(ExecutionSandbox::new(cfg.sandbox.clone()));
        Self::with_runner(sandbox, ShellRunner::new(cfg.shell_path.clone()), shutdown)
    }

    /// 使用指定执行器组装（测试时可替换沙箱）
    pub fn with_runner(
        sandbox: Arc<dyn CodeRunner>,
        shell: ShellRunner,
        shutdown: CancellationToken,
    ) -> Self {
        let router = MessageRouter::new(
            ConnectionRegistry::new(),
            RoomDirectory::new(),
            sandbox,
            shell,
        );
        Self::new(router, shutdown)
    }

    /// 获取消息路由器
    pub fn router(&self) -> MessageRouter {
        self.router.clone()
    }
}
