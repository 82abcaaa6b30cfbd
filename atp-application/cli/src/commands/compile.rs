//! 脚本编译命令: 只组装脚本，不启动测试进程

use anyhow::{Context, Result};
use atp_compiler::ScriptAssembler;
use colored::Colorize;
use std::fs;
use std::path::Path;

use super::common::{open_storage, resolve_project};
use crate::config::AtpConfig;

/// 预览脚本使用的运行 ID
const PREVIEW_RUN_ID: &str = "preview";

pub async fn handle(
    config: &AtpConfig,
    key: &str,
    case_id: Option<i64>,
    output: Option<&Path>,
) -> Result<()> {
    let storage = open_storage(config).await?;
    let project = resolve_project(&storage, key).await?;

    let records = match case_id {
        Some(id) => {
            let record = storage
                .test_cases()
                .get_by_id(id)
                .await?
                .with_context(|| format!("测试用例不存在: {}", id))?;
            if record.project_id != project.id {
                anyhow::bail!("用例 {} 不属于项目 {}", id, project.name);
            }
            vec![record]
        }
        None => storage.test_cases().list_by_project(project.id).await?,
    };

    if records.is_empty() {
        anyhow::bail!("项目 {} 没有测试用例", project.name);
    }

    let test_cases = records
        .iter()
        .map(|r| r.to_test_case())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let script = ScriptAssembler::new().assemble(&test_cases, &project.url, PREVIEW_RUN_ID);

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("创建目录失败: {:?}", parent))?;
            }
            fs::write(path, &script).with_context(|| format!("写入脚本失败: {:?}", path))?;
            eprintln!(
                "{} 已编译 {} 个用例到 {}",
                "✓".green(),
                test_cases.len(),
                path.display()
            );
        }
        None => print!("{}", script),
    }

    Ok(())
}
