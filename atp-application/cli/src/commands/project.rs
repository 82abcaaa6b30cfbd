//! 项目管理命令

use anyhow::Result;
use atp_storage::StorageError;
use colored::Colorize;

use super::common::{format_time, open_storage, resolve_project};
use crate::config::AtpConfig;
use crate::ProjectAction;

pub async fn handle(config: &AtpConfig, action: ProjectAction) -> Result<()> {
    match action {
        ProjectAction::Add {
            name,
            url,
            description,
        } => add_project(config, &name, &url, description.as_deref()).await,
        ProjectAction::List => list_projects(config).await,
        ProjectAction::Remove { project } => remove_project(config, &project).await,
    }
}

async fn add_project(
    config: &AtpConfig,
    name: &str,
    url: &str,
    description: Option<&str>,
) -> Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("站点 URL 必须以 http:// 或 https:// 开头: {}", url);
    }

    let storage = open_storage(config).await?;

    match storage.projects().create(name, url, description).await {
        Ok(id) => {
            println!("{} 已添加项目: {} (ID: {})", "✓".green(), name.yellow(), id);
            println!("  站点: {}", url);
            Ok(())
        }
        Err(StorageError::AlreadyExists(_)) => {
            anyhow::bail!("项目 {} 已存在", name)
        }
        Err(e) => Err(e.into()),
    }
}

async fn list_projects(config: &AtpConfig) -> Result<()> {
    let storage = open_storage(config).await?;
    let projects = storage.projects().list().await?;

    if projects.is_empty() {
        println!("{} 没有项目，使用 'atp project add' 添加", "ℹ".yellow());
        return Ok(());
    }

    println!("{} 找到 {} 个项目:\n", "✓".green(), projects.len());
    println!(
        "{:<6} {:<20} {:<40} {:<8} {:<20}",
        "ID".bold(),
        "名称".bold(),
        "站点".bold(),
        "用例".bold(),
        "创建时间".bold()
    );
    println!("{}", "-".repeat(96));

    for project in projects {
        let cases = storage.test_cases().count_by_project(project.id).await?;
        println!(
            "{:<6} {:<20} {:<40} {:<8} {:<20}",
            project.id,
            project.name,
            project.url,
            cases,
            format_time(&project.created_at)
        );
    }

    Ok(())
}

async fn remove_project(config: &AtpConfig, key: &str) -> Result<()> {
    let storage = open_storage(config).await?;
    let project = resolve_project(&storage, key).await?;

    storage.projects().delete(project.id).await?;
    println!("{} 已删除项目: {}", "✓".green(), project.name);

    Ok(())
}
