/// 配置管理

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// 沙箱运行时
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxRuntime {
    /// docker 容器：断网、限 CPU、只读挂载脚本
    Docker,
    /// 直接在宿主机上用 bash 运行，只有截止时间约束（无容器运行时的开发环境）
    Bare,
}

impl std::str::FromStr for SandboxRuntime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "bare" => Ok(Self::Bare),
            other => Err(anyhow::anyhow!("未知的沙箱运行时: {}", other)),
        }
    }
}

/// 沙箱配置
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxConfig {
    pub runtime: SandboxRuntime,
    pub image: String,
    pub cpus: String,
    pub stop_timeout_secs: u64,
    pub deadline_secs: u64,
    pub script_dir: PathBuf,
    /// 同时执行的上限，0 表示不限制
    pub max_concurrent: usize,
}

impl SandboxConfig {
    /// 外部截止时间
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    /// 不依赖容器运行时的配置
    pub fn bare(script_dir: impl Into<PathBuf>, deadline_secs: u64) -> Self {
        Self {
            runtime: SandboxRuntime::Bare,
            script_dir: script_dir.into(),
            deadline_secs,
            ..Self::default()
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            runtime: SandboxRuntime::Docker,
            image: "bash:latest".to_string(),
            cpus: "0.5".to_string(),
            stop_timeout_secs: 10,
            deadline_secs: 10,
            script_dir: std::env::temp_dir(),
            max_concurrent: 16,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub log_level: String,
    pub shell_path: String,
    pub sandbox: SandboxConfig,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> anyhow::Result<Self> {
        let server_host = std::env::var("SERVER_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = std::env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;

        let log_level = std::env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "debug".to_string());

        let shell_path = std::env::var("SHELL_PATH")
            .unwrap_or_else(|_| "/bin/bash".to_string());

        let defaults = SandboxConfig::default();

        let runtime = match std::env::var("SANDBOX_RUNTIME") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.runtime,
        };

        let image = std::env::var("SANDBOX_IMAGE")
            .unwrap_or(defaults.image);

        let cpus = std::env::var("SANDBOX_CPUS")
            .unwrap_or(defaults.cpus);

        let stop_timeout_secs = std::env::var("SANDBOX_STOP_TIMEOUT_SECS")
            .unwrap_or_else(|_| defaults.stop_timeout_secs.to_string())
            .parse()?;

        let deadline_secs = std::env::var("SANDBOX_DEADLINE_SECS")
            .unwrap_or_else(|_| defaults.deadline_secs.to_string())
            .parse()?;

        let script_dir = std::env::var("SANDBOX_SCRIPT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.script_dir);

        let max_concurrent = std::env::var("SANDBOX_MAX_CONCURRENT")
            .unwrap_or_else(|_| defaults.max_concurrent.to_string())
            .parse()?;

        Ok(Self {
            server_host,
            server_port,
            log_level,
            shell_path,
            sandbox: SandboxConfig {
                runtime,
                image,
                cpus,
                stop_timeout_secs,
                deadline_secs,
                script_dir,
                max_concurrent,
            },
        })
    }
}
