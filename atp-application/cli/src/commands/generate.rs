//! LLM 用例生成命令

use anyhow::Result;
use atp_generator::{build_generator, build_prompt, generate_test_cases};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::common::{open_storage, resolve_project};
use crate::config::AtpConfig;

pub async fn handle(
    config: &AtpConfig,
    key: &str,
    instructions: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let storage = open_storage(config).await?;
    let project = resolve_project(&storage, key).await?;
    let generator = build_generator(&config.generator)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")?);
    spinner.set_message(format!(
        "{} ({}) 正在生成 {} 的测试用例...",
        config.generator.provider,
        generator.model_name(),
        project.url
    ));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let generation = generate_test_cases(generator.as_ref(), &project.url, instructions).await;
    spinner.finish_and_clear();

    let prompt = build_prompt(&project.url, instructions);
    let cases_json = serde_json::to_string(&generation.test_cases)?;
    storage
        .generations()
        .create(
            project.id,
            Some(&prompt),
            &generation.model,
            generation.status(),
            &cases_json,
        )
        .await?;

    if generation.failed {
        println!("{} 生成失败 (模型: {})", "✗".red(), generation.model);
        for step in generation.test_cases.iter().flat_map(|tc| &tc.steps) {
            println!("  {}", step.red());
        }
        return Ok(());
    }

    println!(
        "{} 生成了 {} 个测试用例 (模型: {})\n",
        "✓".green(),
        generation.test_cases.len(),
        generation.model
    );
    for tc in &generation.test_cases {
        println!("  {} [{}]", tc.title.yellow(), tc.priority.as_str());
        for (index, step) in tc.steps.iter().enumerate() {
            println!("    {}. {}", index + 1, step);
        }
    }

    if dry_run {
        println!("\n{} --dry-run: 用例未保存", "ℹ".yellow());
        return Ok(());
    }

    let ids = storage
        .test_cases()
        .create_many(project.id, &generation.test_cases)
        .await?;
    println!(
        "\n{} 已保存 {} 个用例到项目 {}",
        "✓".green(),
        ids.len(),
        project.name
    );

    Ok(())
}
