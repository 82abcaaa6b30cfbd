//! 测试运行命令
//!
//! 触发后台运行并轮询运行记录直到终态。
//! 运行任务在本进程内执行，等待期间退出会中断运行。

use anyhow::{Context, Result};
use atp_common::{RunResult, RunStatus};
use atp_executor::{ExecutorError, RunService};
use atp_storage::RunFilter;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::common::{
    build_service, format_duration, format_time, open_storage, print_output_tail,
    print_run_result, resolve_project, status_colored,
};
use crate::config::AtpConfig;
use crate::{RunAction, WaitArgs};

/// 没有测试结果时显示的原始输出行数
const OUTPUT_TAIL_LINES: usize = 20;

pub async fn handle(config: &AtpConfig, action: RunAction) -> Result<()> {
    match action {
        RunAction::Suite { project, wait } => {
            let storage = open_storage(config).await?;
            let project = resolve_project(&storage, &project).await?;
            let service = build_service(config, storage)?;

            println!(
                "{} 运行项目 {} 的全部用例 ({})",
                "▶".cyan(),
                project.name.yellow(),
                project.url
            );
            let run_id = service.trigger_suite(project.id).await?;
            follow(&service, &run_id, &wait).await
        }
        RunAction::Case { id, wait } => {
            let storage = open_storage(config).await?;
            let service = build_service(config, storage)?;

            println!("{} 运行用例 {}", "▶".cyan(), id);
            let run_id = service.trigger_single(id).await?;
            follow(&service, &run_id, &wait).await
        }
        RunAction::RerunFailed { run_id, wait } => {
            let storage = open_storage(config).await?;
            let service = build_service(config, storage)?;

            println!("{} 重跑运行 {} 中失败的用例", "▶".cyan(), run_id);
            let rerun_id = service.trigger_rerun_failed(&run_id).await?;
            follow(&service, &rerun_id, &wait).await
        }
        RunAction::Show { run_id, raw } => show_run(config, &run_id, raw).await,
        RunAction::List {
            project,
            status,
            limit,
            page,
        } => list_runs(config, &project, status.as_deref(), limit, page).await,
    }
}

/// 轮询运行直到终态，失败时返回错误以便得到非零退出码
///
/// 等待超时会把运行标记为 FAILED：本进程退出后后台任务也随之结束。
async fn follow(service: &RunService, run_id: &str, wait: &WaitArgs) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")?);
    spinner.set_message(format!("运行 {} 进行中", run_id));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let interval = Duration::from_millis(wait.interval_ms.max(50));
    let deadline = wait.wait_timeout.map(Duration::from_secs);

    let result: RunResult = match service.wait_for_completion(run_id, interval, deadline).await {
        Ok(result) => result,
        Err(ExecutorError::Timeout(secs)) => {
            spinner.abandon_with_message(format!("运行 {} 等待超时", run_id));
            let reason = format!("wait timeout after {}s", secs);
            if service.abort(run_id, &reason).await? {
                anyhow::bail!("等待运行超时 ({} 秒)，运行已标记为 FAILED", secs);
            }
            // 中止前运行刚好结束
            service.run_status(run_id).await?
        }
        Err(e) => {
            spinner.abandon();
            return Err(e.into());
        }
    };
    spinner.finish_and_clear();

    println!();
    print_run_result(&result);

    if result.per_test_results.is_empty() && !result.raw_output.is_empty() {
        println!("\n  原始输出:");
        print_output_tail(&result.raw_output, OUTPUT_TAIL_LINES);
    }

    if result.status == RunStatus::Failed {
        println!(
            "\n{} 使用 'atp run rerun-failed {}' 重跑失败的用例",
            "ℹ".yellow(),
            run_id
        );
        anyhow::bail!("运行 {} 失败", run_id);
    }

    println!("\n{} 运行通过", "✓".green());
    Ok(())
}

async fn show_run(config: &AtpConfig, run_id: &str, raw: bool) -> Result<()> {
    let storage = open_storage(config).await?;
    let record = storage
        .runs()
        .get_by_id(run_id)
        .await?
        .with_context(|| format!("运行不存在: {}", run_id))?;

    println!("{} 运行详情\n", "📊".cyan());
    println!("  类型: {}", record.run_type);
    if let Some(project) = storage.projects().get_by_id(record.project_id).await? {
        println!("  项目: {} ({})", project.name.yellow(), project.url);
    }
    if let Some(case_id) = record.test_case_id {
        println!("  用例: {}", case_id);
    }
    if let Some(parent) = &record.parent_run_id {
        println!("  父运行: {}", parent);
    }
    println!("  创建时间: {}", format_time(&record.created_at));
    println!("  总耗时: {}", format_duration(record.duration_ms));

    let result = record.to_run_result()?;
    print_run_result(&result);

    if raw && !result.raw_output.is_empty() {
        println!("\n  原始输出:\n");
        println!("{}", result.raw_output);
    }

    Ok(())
}

async fn list_runs(
    config: &AtpConfig,
    key: &str,
    status: Option<&str>,
    limit: i64,
    page: i64,
) -> Result<()> {
    let storage = open_storage(config).await?;
    let project = resolve_project(&storage, key).await?;

    let status = status
        .map(|s| s.parse::<RunStatus>().map_err(anyhow::Error::msg))
        .transpose()?;
    let limit = limit.max(1);
    let filter = RunFilter {
        project_id: Some(project.id),
        status,
        limit: Some(limit),
        offset: Some((page.max(1) - 1) * limit),
    };

    let total = storage.runs().count(&filter).await?;
    let runs = storage.runs().list(&filter).await?;

    if runs.is_empty() {
        println!("{} 项目 {} 没有匹配的运行记录", "ℹ".yellow(), project.name);
        return Ok(());
    }

    println!(
        "{} 项目 {} 共 {} 次运行 (第 {} 页):\n",
        "✓".green(),
        project.name.yellow(),
        total,
        page.max(1)
    );
    println!(
        "{:<38} {:<8} {:<10} {:<12} {:<10} {:<20}",
        "运行 ID".bold(),
        "类型".bold(),
        "状态".bold(),
        "通过/总数".bold(),
        "耗时".bold(),
        "创建时间".bold()
    );
    println!("{}", "-".repeat(102));

    for run in runs {
        let status = run
            .run_status()
            .map(status_colored)
            .unwrap_or_else(|_| run.status.as_str().normal());
        println!(
            "{:<38} {:<8} {:<10} {:<12} {:<10} {:<20}",
            run.id,
            run.run_type,
            status,
            format!("{}/{}", run.pass_count, run.total_count),
            format_duration(run.duration_ms),
            format_time(&run.created_at)
        );
    }

    Ok(())
}
