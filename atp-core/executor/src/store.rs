//! 运行编排所需的持久化接口
//!
//! 编排器只依赖 `RunStore`，SQLite 的 `Storage` 是默认实现。

use async_trait::async_trait;
use atp_common::{RunResult, RunType, TestCase};
use atp_compiler::{base_title, sanitize_title, strip_run_prefix};
use atp_storage::{RunUpdate, Storage, TestRunRecord};
use std::collections::HashSet;
use tracing::debug;

use crate::{ExecutorError, Result};

#[async_trait]
pub trait RunStore: Send + Sync {
    /// 解析运行对应的测试用例 (可能为空)
    async fn find_test_cases_for_run(&self, run_id: &str) -> Result<Vec<TestCase>>;

    /// 运行所属项目的目标 URL
    async fn find_target_url(&self, run_id: &str) -> Result<String>;

    async fn update_run_status(&self, run_id: &str, update: RunUpdate) -> Result<()>;

    async fn read_run(&self, run_id: &str) -> Result<RunResult>;
}

async fn require_run(storage: &Storage, run_id: &str) -> Result<TestRunRecord> {
    storage
        .runs()
        .get_by_id(run_id)
        .await?
        .ok_or_else(|| ExecutorError::NotFound(format!("运行 {}", run_id)))
}

/// 关联了单个用例的运行只取该用例，否则取项目全部用例
async fn base_cases(storage: &Storage, run: &TestRunRecord) -> Result<Vec<TestCase>> {
    let records = match run.test_case_id {
        Some(id) => storage.test_cases().get_by_id(id).await?.into_iter().collect(),
        None => storage.test_cases().list_by_project(run.project_id).await?,
    };
    records
        .iter()
        .map(|r| r.to_test_case().map_err(ExecutorError::from))
        .collect()
}

#[async_trait]
impl RunStore for Storage {
    async fn find_test_cases_for_run(&self, run_id: &str) -> Result<Vec<TestCase>> {
        let run = require_run(self, run_id).await?;

        let cases = match run.run_type()? {
            RunType::Suite => base_cases(self, &run).await?,
            RunType::Single => {
                if run.test_case_id.is_none() {
                    return Err(ExecutorError::InvalidState(format!(
                        "SINGLE 运行 {} 没有关联测试用例",
                        run_id
                    )));
                }
                // 同名用例共用一个标题，其中任意一个失败都会全部重跑
                base_cases(self, &run).await?
            }
            RunType::Rerun => {
                let parent_id = run.parent_run_id.as_deref().ok_or_else(|| {
                    ExecutorError::InvalidState(format!("RERUN 运行 {} 没有父运行", run_id))
                })?;
                let parent = require_run(self, parent_id).await?;
                let failed: HashSet<String> = parent
                    .test_results()?
                    .iter()
                    .filter(|r| !r.is_pass())
                    .map(|r| base_title(strip_run_prefix(&r.test_title)).to_string())
                    .collect();

                // 同名用例共用一个标题，其中任意一个失败都会全部重跑
                base_cases(self, &run)
                    .await?
                    .into_iter()
                    .filter(|tc| failed.contains(&sanitize_title(&tc.title)))
                    .collect()
            }
        };

        debug!("运行 {} 解析到 {} 个测试用例", run_id, cases.len());
        Ok(cases)
    }

    async fn find_target_url(&self, run_id: &str) -> Result<String> {
        let run = require_run(self, run_id).await?;
        let project = self
            .projects()
            .get_by_id(run.project_id)
            .await?
            .ok_or_else(|| ExecutorError::NotFound(format!("项目 {}", run.project_id)))?;
        Ok(project.url)
    }

    async fn update_run_status(&self, run_id: &str, update: RunUpdate) -> Result<()> {
        self.runs().update_status(run_id, &update).await?;
        Ok(())
    }

    async fn read_run(&self, run_id: &str) -> Result<RunResult> {
        Ok(require_run(self, run_id).await?.to_run_result()?)
    }
}
