//! 测试报告导出命令

use anyhow::{Context, Result};
use atp_common::TestResult;
use atp_storage::{ProjectRecord, TestRunRecord};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::Path;

use super::common::open_storage;
use crate::config::AtpConfig;
use crate::ReportAction;

pub async fn handle(config: &AtpConfig, action: ReportAction) -> Result<()> {
    match action {
        ReportAction::Export {
            run_id,
            output,
            format,
        } => export_report(config, &run_id, output.as_deref(), &format).await,
    }
}

/// 导出内容
#[derive(Serialize)]
struct RunReport {
    run: TestRunRecord,
    project: Option<ProjectRecord>,
    results: Vec<TestResult>,
}

fn render(report: &RunReport, format: &str) -> Result<String> {
    Ok(match format {
        "json" => serde_json::to_string_pretty(report)?,
        "yaml" => serde_yaml::to_string(report)?,
        _ => anyhow::bail!("不支持的格式: {} (支持 json/yaml)", format),
    })
}

async fn export_report(
    config: &AtpConfig,
    run_id: &str,
    output: Option<&Path>,
    format: &str,
) -> Result<()> {
    let storage = open_storage(config).await?;

    let run = storage
        .runs()
        .get_by_id(run_id)
        .await?
        .with_context(|| format!("运行不存在: {}", run_id))?;
    let project = storage.projects().get_by_id(run.project_id).await?;
    let results = run.test_results()?;

    let report = RunReport {
        run,
        project,
        results,
    };
    let content = render(&report, format)?;

    match output {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("写入报告失败: {:?}", path))?;
            println!("{} 报告已导出到: {}", "✓".green(), path.display());
        }
        None => println!("{}", content),
    }

    Ok(())
}
