//! 运行器配置

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::{ExecutorError, Result};

/// 外部测试进程配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// 测试命令 (由 shell 执行)
    #[serde(default = "default_program")]
    pub program: String,

    /// Playwright 配置文件 (相对项目根目录)
    #[serde(default = "default_config_file")]
    pub config_file: Option<String>,

    /// 项目根目录 (进程工作目录)
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    /// 临时脚本目录 (相对项目根目录)
    #[serde(default = "default_generated_dir")]
    pub generated_dir: PathBuf,

    /// 每个输出流最多保留的字节数
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// 超时后杀死进程 (秒)，默认不限制
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// 额外环境变量 (`CI=true` 总会设置)
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_program() -> String {
    "npx playwright test".to_string()
}
fn default_config_file() -> Option<String> {
    Some("playwright.config.js".to_string())
}
fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_generated_dir() -> PathBuf {
    PathBuf::from("tests/generated")
}
fn default_max_output_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            config_file: default_config_file(),
            project_root: default_project_root(),
            generated_dir: default_generated_dir(),
            max_output_bytes: default_max_output_bytes(),
            timeout_secs: None,
            env: HashMap::new(),
        }
    }
}

impl RunnerConfig {
    /// 临时脚本所在目录的绝对 (或相对当前目录的) 路径
    pub fn script_dir(&self) -> PathBuf {
        self.project_root.join(&self.generated_dir)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(ExecutorError::ConfigError("runner.program 不能为空".to_string()));
        }
        if self.max_output_bytes == 0 {
            return Err(ExecutorError::ConfigError(
                "runner.max_output_bytes 必须大于 0".to_string(),
            ));
        }
        if self.generated_dir.is_absolute() {
            return Err(ExecutorError::ConfigError(
                "runner.generated_dir 必须是相对项目根目录的路径".to_string(),
            ));
        }
        Ok(())
    }
}
