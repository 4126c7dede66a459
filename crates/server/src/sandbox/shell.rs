/// 旧版直接 shell 执行
///
/// 不经过沙箱、没有超时，按原有行为保留

use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell_path: String,
}

impl ShellRunner {
    pub fn new(shell_path: impl Into<String>) -> Self {
        Self {
            shell_path: shell_path.into(),
        }
    }

    /// 执行命令：成功返回标准输出，失败返回标准错误（为空时返回错误描述）
    pub async fn run_command(&self, command: &str) -> Result<String, String> {
        debug!("执行 shell 命令: {}", common::utils::truncate_for_log(command, 120));

        let output = Command::new(&self.shell_path)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| format!("执行命令失败: {}", e))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        warn!("shell 命令退出异常: {}", output.status);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.is_empty() {
            Err(format!("Command failed with {}", output.status))
        } else {
            Err(stderr.into_owned())
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("/bin/bash")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdout_on_success() {
        let shell = ShellRunner::new("sh");
        assert_eq!(shell.run_command("echo hi").await, Ok("hi\n".to_string()));
    }

    #[tokio::test]
    async fn test_stderr_on_failure() {
        let shell = ShellRunner::new("sh");
        assert_eq!(
            shell.run_command("echo nope >&2; exit 1").await,
            Err("nope\n".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_shell() {
        let shell = ShellRunner::new("/definitely/not/a/shell");
        let err = shell.run_command("true").await.unwrap_err();
        assert!(err.starts_with("执行命令失败"));
    }
}
