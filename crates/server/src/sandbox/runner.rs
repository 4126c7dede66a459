/// 代码执行抽象层

use async_trait::async_trait;
use std::time::Duration;

/// 正常结束但没有标准输出时返回的内容
pub const NO_OUTPUT: &str = "No output";

/// 一次执行的结果
///
/// 所有结局都以值的形式返回，调用方按标签分支处理
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// 正常退出：标准输出，为空时为 "No output"
    Completed(String),
    /// 非零退出：标准错误，为空时为错误描述
    NonZeroExit(String),
    /// 超过截止时间或被信号终止
    TimedOut { deadline: Duration },
    /// 脚本无法落盘或进程无法启动
    LaunchFailed(String),
}

impl ExecutionResult {
    /// 正常结束时的结果
    pub fn completed(stdout: impl Into<String>) -> Self {
        let stdout = stdout.into();
        if stdout.is_empty() {
            Self::Completed(NO_OUTPUT.to_string())
        } else {
            Self::Completed(stdout)
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// 转换为展示给用户的文本
    pub fn into_content(self) -> String {
        match self {
            Self::Completed(out) | Self::NonZeroExit(out) => out,
            Self::TimedOut { deadline } => format!(
                "Session timed out: command took longer than {} seconds",
                deadline.as_secs()
            ),
            Self::LaunchFailed(detail) => format!("❌ Error: {}", detail),
        }
    }
}

/// 代码执行器 Trait
#[async_trait]
pub trait CodeRunner: Send + Sync + 'static {
    /// 执行一段脚本；调用之间不共享可变状态
    async fn execute(&self, code: &str) -> ExecutionResult;

    /// 运行时名称
    fn runtime_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_output_becomes_no_output() {
        assert_eq!(ExecutionResult::completed(""), ExecutionResult::Completed(NO_OUTPUT.into()));
        assert_eq!(ExecutionResult::completed("hi\n").into_content(), "hi\n");
    }

    #[test]
    fn test_timeout_message() {
        let result = ExecutionResult::TimedOut { deadline: Duration::from_secs(10) };
        assert!(result.is_timeout());
        assert_eq!(
            result.into_content(),
            "Session timed out: command took longer than 10 seconds"
        );
    }

    #[test]
    fn test_launch_failure_is_prefixed() {
        let content = ExecutionResult::LaunchFailed("docker: not found".into()).into_content();
        assert_eq!(content, "❌ Error: docker: not found");
    }
}
