//! ATP 执行器
//!
//! 测试运行编排引擎：解析运行对应的测试用例，组装脚本，
//! 调用外部测试进程并解析其 JSON 报告。

pub mod config;
pub mod orchestrator;
pub mod process;
pub mod report;
pub mod script_file;
pub mod store;
pub mod trigger;

pub use config::RunnerConfig;
pub use orchestrator::RunOrchestrator;
pub use process::{shell_safe_path, PlaywrightRunner, ProcessOutput, ScriptRunner};
pub use report::{derive_status, evaluate, extract_json, parse_report, Evaluation};
pub use script_file::{script_file_name, ScriptFile};
pub use store::RunStore;
pub use trigger::RunService;

use atp_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("未找到: {0}")]
    NotFound(String),

    #[error("状态无效: {0}")]
    InvalidState(String),

    /// 运行已经开始或已经结束
    #[error("运行状态不可迁移: {0}")]
    InvalidTransition(String),

    #[error("脚本写入失败: {0}")]
    ScriptWriteFailed(String),

    #[error("进程启动失败: {0}")]
    ProcessSpawnFailed(String),

    #[error("执行超时 ({0} 秒)")]
    Timeout(u64),

    #[error("报告解析失败: {0}")]
    ReportParseFailed(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    SerdeError(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),
}

impl From<StorageError> for ExecutorError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => ExecutorError::NotFound(msg),
            StorageError::InvalidTransition(msg) => ExecutorError::InvalidTransition(msg),
            other => ExecutorError::DatabaseError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
