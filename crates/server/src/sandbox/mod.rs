/// 代码执行模块
/// 
/// 沙箱执行（隔离、限资源、有截止时间）与旧版直接 shell 执行

pub mod container;
pub mod runner;
pub mod shell;

pub use container::ExecutionSandbox;
pub use runner::{CodeRunner, ExecutionResult, NO_OUTPUT};
pub use shell::ShellRunner;
