/// 沙箱执行器
///
/// 每次执行：
/// 1. 将代码写入唯一命名的临时脚本
/// 2. 在断网、限 CPU、只读挂载的容器中运行脚本
/// 3. 用外部截止时间兜底（独立于容器自身的 stop-timeout）
/// 4. 无论结果如何都删除临时脚本

use async_trait::async_trait;
use common::utils::generate_id;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::runner::{CodeRunner, ExecutionResult};
use crate::config::{SandboxConfig, SandboxRuntime};

/// 容器名前缀
const CONTAINER_PREFIX: &str = "boxsh-";

/// 容器内脚本路径
const CONTAINER_SCRIPT_PATH: &str = "/script.sh";

/// 临时脚本，离开作用域时删除（删除失败忽略）
struct ScriptFile {
    path: PathBuf,
}

impl ScriptFile {
    fn path_for(dir: &Path, run_id: &str) -> Self {
        Self {
            path: dir.join(format!("{}.sh", run_id)),
        }
    }

    async fn write(&self, code: &str) -> std::io::Result<()> {
        tokio::fs::write(&self.path, code).await
    }
}

impl Drop for ScriptFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("删除临时脚本 {} 失败（忽略）: {}", self.path.display(), e);
        }
    }
}

/// 沙箱执行器
#[derive(Clone)]
pub struct ExecutionSandbox {
    config: SandboxConfig,
    permits: Option<Arc<Semaphore>>,
}

impl ExecutionSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        let permits = match config.max_concurrent {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        Self { config, permits }
    }

    /// 构造启动命令
    fn build_command(&self, script: &Path, container_name: &str) -> Command {
        let mut command = match self.config.runtime {
            SandboxRuntime::Docker => {
                let mut cmd = Command::new("docker");
                cmd.args(["run", "--rm", "--name", container_name])
                    .args(["--network", "none"])
                    .arg(format!("--cpus={}", self.config.cpus))
                    .arg(format!("--stop-timeout={}", self.config.stop_timeout_secs))
                    .arg("-v")
                    .arg(format!("{}:{}:ro", script.display(), CONTAINER_SCRIPT_PATH))
                    .arg(&self.config.image)
                    .args(["bash", CONTAINER_SCRIPT_PATH]);
                cmd
            }
            SandboxRuntime::Bare => {
                let mut cmd = Command::new("bash");
                cmd.arg(script);
                cmd
            }
        };

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// 截止时间触发后，确保容器本身也被终止
    fn kill_container(&self, container_name: &str) {
        if self.config.runtime != SandboxRuntime::Docker {
            return;
        }
        let name = container_name.to_string();
        tokio::spawn(async move {
            match Command::new("docker")
                .args(["kill", &name])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
            {
                Ok(status) => debug!("docker kill {}: {}", name, status),
                Err(e) => warn!("终止容器 {} 失败: {}", name, e),
            }
        });
    }

    /// 根据退出状态归类结果
    fn classify(&self, status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> ExecutionResult {
        if status.success() {
            return ExecutionResult::completed(String::from_utf8_lossy(stdout));
        }

        if terminated_by_signal(status) {
            return ExecutionResult::TimedOut {
                deadline: self.config.deadline(),
            };
        }

        let stderr = String::from_utf8_lossy(stderr);
        if stderr.is_empty() {
            ExecutionResult::NonZeroExit(format!("Command failed with {}", status))
        } else {
            ExecutionResult::NonZeroExit(stderr.into_owned())
        }
    }

}

/// 执行进程本身被信号终止（外部截止时间之外的 kill）
///
/// docker 客户端正常退出时只转发脚本的退出码；脚本自己 `exit 137`
/// 与容器被 OOM 终止无法仅凭退出码区分，统一按非零退出返回
#[cfg(unix)]
fn terminated_by_signal(status: ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal().is_some()
}

#[cfg(not(unix))]
fn terminated_by_signal(_status: ExitStatus) -> bool {
    false
}

#[async_trait]
impl CodeRunner for ExecutionSandbox {
    async fn execute(&self, code: &str) -> ExecutionResult {
        let _permit = match &self.permits {
            Some(permits) => match permits.clone().acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(e) => return ExecutionResult::LaunchFailed(e.to_string()),
            },
            None => None,
        };

        let run_id = generate_id();
        let container_name = format!("{}{}", CONTAINER_PREFIX, run_id);
        let script = ScriptFile::path_for(&self.config.script_dir, &run_id);

        if let Err(e) = script.write(code).await {
            error!("写入临时脚本 {} 失败: {}", script.path.display(), e);
            return ExecutionResult::LaunchFailed(format!("failed to write script: {}", e));
        }

        info!("▶️ 开始执行: run_id={}, runtime={}, {} bytes", run_id, self.runtime_name(), code.len());
        let started = Instant::now();

        let child = match self.build_command(&script.path, &container_name).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("启动执行进程失败: run_id={}, {}", run_id, e);
                return ExecutionResult::LaunchFailed(e.to_string());
            }
        };

        let result = match tokio::time::timeout(self.config.deadline(), child.wait_with_output()).await {
            Ok(Ok(output)) => self.classify(output.status, &output.stdout, &output.stderr),
            Ok(Err(e)) => {
                error!("等待执行进程失败: run_id={}, {}", run_id, e);
                ExecutionResult::LaunchFailed(e.to_string())
            }
            Err(_) => {
                // 子进程随 future 一起被丢弃并终止（kill_on_drop）
                self.kill_container(&container_name);
                ExecutionResult::TimedOut {
                    deadline: self.config.deadline(),
                }
            }
        };

        if result.is_timeout() {
            warn!("⏱️ 执行超时: run_id={}, elapsed={:?}", run_id, started.elapsed());
        } else {
            info!("✅ 执行结束: run_id={}, elapsed={:?}", run_id, started.elapsed());
        }

        result
    }

    fn runtime_name(&self) -> &str {
        match self.config.runtime {
            SandboxRuntime::Docker => "docker",
            SandboxRuntime::Bare => "bare",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::NO_OUTPUT;
    use std::time::Duration;

    fn bare_sandbox(dir: &Path, deadline_secs: u64) -> ExecutionSandbox {
        ExecutionSandbox::new(SandboxConfig::bare(dir, deadline_secs))
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_echo_hello() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = bare_sandbox(dir.path(), 10);

        let result = sandbox.execute("echo hello").await;
        match result {
            ExecutionResult::Completed(out) => assert!(out.contains("hello")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_empty_script_returns_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = bare_sandbox(dir.path(), 10);

        let result = sandbox.execute("").await;
        assert_eq!(result, ExecutionResult::Completed(NO_OUTPUT.to_string()));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_deadline_wins_over_long_script() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = bare_sandbox(dir.path(), 1);

        let started = Instant::now();
        let result = sandbox.execute("sleep 30").await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(
            result.into_content(),
            "Session timed out: command took longer than 1 seconds"
        );
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_non_zero_exit_returns_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = bare_sandbox(dir.path(), 10);

        let result = sandbox.execute("echo boom >&2; exit 3").await;
        assert_eq!(result, ExecutionResult::NonZeroExit("boom\n".to_string()));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_non_zero_exit_without_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = bare_sandbox(dir.path(), 10);

        match sandbox.execute("exit 2").await {
            ExecutionResult::NonZeroExit(detail) => assert!(detail.contains('2')),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_script_dir_fails_to_launch() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = bare_sandbox(&dir.path().join("missing"), 10);

        let result = sandbox.execute("echo hi").await;
        assert!(matches!(result, ExecutionResult::LaunchFailed(_)));
    }

    #[tokio::test]
    async fn test_concurrent_executions_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = bare_sandbox(dir.path(), 10);

        let (a, b) = tokio::join!(
            sandbox.execute("echo first"),
            sandbox.execute("echo second"),
        );
        assert_eq!(a, ExecutionResult::Completed("first\n".to_string()));
        assert_eq!(b, ExecutionResult::Completed("second\n".to_string()));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_admission_limit_serializes_runs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SandboxConfig::bare(dir.path(), 10);
        config.max_concurrent = 1;
        let sandbox = ExecutionSandbox::new(config);

        let started = Instant::now();
        let (a, b) = tokio::join!(
            sandbox.execute("sleep 0.5; echo a"),
            sandbox.execute("sleep 0.5; echo b"),
        );
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert!(matches!(a, ExecutionResult::Completed(_)));
        assert!(matches!(b, ExecutionResult::Completed(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_codes_are_not_timeouts() {
        use std::os::unix::process::ExitStatusExt;

        let sandbox = ExecutionSandbox::new(SandboxConfig::default());
        let exited_137 = ExitStatus::from_raw(137 << 8);
        assert_eq!(
            sandbox.classify(exited_137, b"", b"out of patience\n"),
            ExecutionResult::NonZeroExit("out of patience\n".to_string())
        );

        let killed = ExitStatus::from_raw(9);
        assert!(sandbox.classify(killed, b"", b"").is_timeout());
    }

    #[tokio::test]
    async fn test_script_exit_137_returns_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = bare_sandbox(dir.path(), 10);

        let result = sandbox.execute("echo bye >&2; exit 137").await;
        assert_eq!(result, ExecutionResult::NonZeroExit("bye\n".to_string()));
    }

    #[test]
    fn test_docker_command_line() {
        let sandbox = ExecutionSandbox::new(SandboxConfig::default());
        let command = sandbox.build_command(Path::new("/tmp/abc.sh"), "boxsh-abc");
        let std_cmd = command.as_std();

        assert_eq!(std_cmd.get_program(), "docker");
        let args: Vec<String> = std_cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "run", "--rm", "--name", "boxsh-abc", "--network", "none",
                "--cpus=0.5", "--stop-timeout=10", "-v", "/tmp/abc.sh:/script.sh:ro",
                "bash:latest", "bash", "/script.sh",
            ]
        );
    }

    #[tokio::test]
    #[ignore = "需要本机可用的 docker"]
    async fn test_docker_echo() {
        let sandbox = ExecutionSandbox::new(SandboxConfig::default());
        match sandbox.execute("echo hello").await {
            ExecutionResult::Completed(out) => assert!(out.contains("hello")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
