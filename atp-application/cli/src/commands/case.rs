//! 测试用例管理命令

use anyhow::{Context, Result};
use atp_common::TestCase;
use atp_compiler::{
    looks_like_automation_code, strip_code_fences, translate, PlaywrightRenderer, ScriptRenderer,
};
use colored::Colorize;
use std::fs;
use std::path::Path;

use super::common::{format_time, open_storage, resolve_project};
use crate::config::AtpConfig;
use crate::CaseAction;

pub async fn handle(config: &AtpConfig, action: CaseAction) -> Result<()> {
    match action {
        CaseAction::Import { project, file } => import_cases(config, &project, &file).await,
        CaseAction::List { project } => list_cases(config, &project).await,
        CaseAction::Show { id, translate } => show_case(config, id, translate).await,
    }
}

/// 解析用例文件
///
/// 接受 `{"testCases": [...]}`、用例数组或单个用例，YAML 先转换为 JSON。
fn parse_case_file(content: &str, path: &Path) -> Result<Vec<TestCase>> {
    let json = match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => {
            let value: serde_json::Value = serde_yaml::from_str(content)
                .with_context(|| format!("解析 YAML 失败: {:?}", path))?;
            serde_json::to_string(&value)?
        }
        _ => content.to_string(),
    };

    atp_generator::extract_test_cases(&json).with_context(|| format!("没有可导入的用例: {:?}", path))
}

async fn import_cases(config: &AtpConfig, key: &str, file: &Path) -> Result<()> {
    let content =
        fs::read_to_string(file).with_context(|| format!("读取用例文件失败: {:?}", file))?;
    let test_cases = parse_case_file(&content, file)?;

    let storage = open_storage(config).await?;
    let project = resolve_project(&storage, key).await?;

    let ids = storage.test_cases().create_many(project.id, &test_cases).await?;

    println!(
        "{} 已导入 {} 个用例到项目 {}",
        "✓".green(),
        ids.len(),
        project.name.yellow()
    );
    for (id, tc) in ids.iter().zip(&test_cases) {
        println!("  [{}] {}", id, tc.title);
    }

    Ok(())
}

async fn list_cases(config: &AtpConfig, key: &str) -> Result<()> {
    let storage = open_storage(config).await?;
    let project = resolve_project(&storage, key).await?;
    let cases = storage.test_cases().list_by_project(project.id).await?;

    if cases.is_empty() {
        println!("{} 项目 {} 还没有测试用例", "ℹ".yellow(), project.name);
        return Ok(());
    }

    println!("{} 项目 {} 共 {} 个用例:\n", "✓".green(), project.name.yellow(), cases.len());
    println!(
        "{:<6} {:<40} {:<8} {:<8} {:<20}",
        "ID".bold(),
        "标题".bold(),
        "优先级".bold(),
        "类型".bold(),
        "创建时间".bold()
    );
    println!("{}", "-".repeat(86));

    for record in cases {
        let kind = if record.code.is_some() { "代码" } else { "步骤" };
        println!(
            "{:<6} {:<40} {:<8} {:<8} {:<20}",
            record.id,
            record.title,
            record.priority,
            kind,
            format_time(&record.created_at)
        );
    }

    Ok(())
}

async fn show_case(config: &AtpConfig, id: i64, show_translation: bool) -> Result<()> {
    let storage = open_storage(config).await?;
    let record = storage
        .test_cases()
        .get_by_id(id)
        .await?
        .with_context(|| format!("测试用例不存在: {}", id))?;
    let test_case = record.to_test_case()?;

    println!("{} 测试用例详情\n", "📋".cyan());
    println!("  ID: {}", record.id);
    println!("  标题: {}", test_case.title.yellow());
    println!("  优先级: {}", test_case.priority.as_str());
    if let Some(expected) = &test_case.expected_result {
        println!("  预期结果: {}", expected);
    }

    if let Some(code) = &test_case.raw_code {
        let code = strip_code_fences(code);
        let kind = if looks_like_automation_code(&code) {
            "自动化代码".green()
        } else {
            "按步骤翻译".yellow()
        };
        println!("\n  代码 ({}):", kind);
        for line in code.lines() {
            println!("    {}", line.dimmed());
        }
    }

    if !test_case.steps.is_empty() {
        println!("\n  步骤:");
        let renderer = PlaywrightRenderer::new();
        for (index, step) in test_case.steps.iter().enumerate() {
            println!("    {}. {}", index + 1, step);
            if show_translation {
                let statement = translate(step, &index.to_string());
                for line in renderer.render(&statement) {
                    println!("       {}", line.cyan());
                }
            }
        }
    }

    Ok(())
}
