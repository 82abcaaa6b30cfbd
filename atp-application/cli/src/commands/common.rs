//! 公共工具函数模块
//!
//! 提供各命令模块共享的功能，包括：
//! - 数据库打开与运行服务构造
//! - 项目 ID / 名称解析
//! - 运行结果的终端输出

use anyhow::{Context, Result};
use atp_common::{RunResult, RunStatus};
use atp_executor::{PlaywrightRunner, RunOrchestrator, RunService};
use atp_storage::{ProjectRecord, Storage, StorageManager};
use chrono::{DateTime, Local, Utc};
use colored::{ColoredString, Colorize};
use std::sync::Arc;
use tracing::debug;

use crate::config::AtpConfig;

/// 打开配置中的数据库 (会自动执行迁移)
pub async fn open_storage(config: &AtpConfig) -> Result<Arc<Storage>> {
    let manager = StorageManager::new(&config.database.path)
        .await
        .with_context(|| format!("打开数据库失败: {}", config.database.path))?;
    Ok(Arc::new(Storage::from_manager(&manager)))
}

/// 构造运行服务: SQLite 存储 + Playwright 进程
pub fn build_service(config: &AtpConfig, storage: Arc<Storage>) -> Result<RunService> {
    let runner_config = config.runner.clone();
    runner_config.validate()?;

    let script_dir = runner_config.script_dir();
    debug!("临时脚本目录: {:?}", script_dir);

    let runner = Arc::new(PlaywrightRunner::new(runner_config));
    let orchestrator = Arc::new(RunOrchestrator::new(storage.clone(), runner, script_dir));

    Ok(RunService::new(storage, orchestrator))
}

/// 按 ID 或名称查找项目
pub async fn resolve_project(storage: &Storage, key: &str) -> Result<ProjectRecord> {
    let found = match key.parse::<i64>() {
        Ok(id) => storage.projects().get_by_id(id).await?,
        Err(_) => storage.projects().get_by_name(key).await?,
    };
    found.with_context(|| format!("项目不存在: {}", key))
}

pub fn status_colored(status: RunStatus) -> ColoredString {
    match status {
        RunStatus::Passed => status.as_str().green(),
        RunStatus::Failed => status.as_str().red(),
        RunStatus::Running => status.as_str().cyan(),
        RunStatus::Pending => status.as_str().yellow(),
    }
}

pub fn format_duration(ms: i64) -> String {
    format!("{:.2}s", ms as f64 / 1000.0)
}

pub fn format_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// 输出运行结果的测试明细
pub fn print_run_result(result: &RunResult) {
    let (passed, failed) = result.counts();

    println!("  运行: {}", result.run_id);
    println!("  状态: {}", status_colored(result.status));
    if let Some(executed_at) = &result.executed_at {
        println!("  完成时间: {}", format_time(executed_at));
    }
    println!(
        "  测试: {} 个, 通过 {}, 失败 {}",
        result.per_test_results.len(),
        passed.to_string().green(),
        failed.to_string().red()
    );

    if !result.per_test_results.is_empty() {
        println!();
        for test in &result.per_test_results {
            let icon = if test.is_pass() { "✓".green() } else { "✗".red() };
            println!(
                "    {} {} ({})",
                icon,
                test.test_title,
                format_duration(test.duration_ms as i64)
            );
            if let Some(error) = &test.error {
                for line in error.lines().take(5) {
                    println!("      {}", line.red());
                }
            }
        }
    }
}

/// 输出原始输出的最后几行
pub fn print_output_tail(raw_output: &str, lines: usize) {
    let all: Vec<&str> = raw_output.lines().collect();
    let start = all.len().saturating_sub(lines);
    if start > 0 {
        println!("    {}", format!("... 省略 {} 行", start).dimmed());
    }
    for line in &all[start..] {
        println!("    {}", line.dimmed());
    }
}
