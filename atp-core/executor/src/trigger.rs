//! 运行触发服务
//!
//! 触发时只创建 PENDING 记录并返回运行 ID，编排在后台任务中进行。
//! 调用方通过轮询运行记录观察进度。

use atp_common::{RunResult, RunStatus, RunType};
use atp_storage::{RunUpdate, Storage, StorageError, TestRunRecord};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::orchestrator::RunOrchestrator;
use crate::store::RunStore;
use crate::{ExecutorError, Result};

pub struct RunService {
    storage: Arc<Storage>,
    orchestrator: Arc<RunOrchestrator>,
}

impl RunService {
    pub fn new(storage: Arc<Storage>, orchestrator: Arc<RunOrchestrator>) -> Self {
        Self {
            storage,
            orchestrator,
        }
    }

    /// 运行项目下全部测试用例
    pub async fn trigger_suite(&self, project_id: i64) -> Result<String> {
        self.storage
            .projects()
            .get_by_id(project_id)
            .await?
            .ok_or_else(|| ExecutorError::NotFound(format!("项目 {}", project_id)))?;

        let run = TestRunRecord::pending(project_id, RunType::Suite, None, None);
        self.start(run).await
    }

    /// 运行单个测试用例
    pub async fn trigger_single(&self, test_case_id: i64) -> Result<String> {
        let test_case = self
            .storage
            .test_cases()
            .get_by_id(test_case_id)
            .await?
            .ok_or_else(|| ExecutorError::NotFound(format!("测试用例 {}", test_case_id)))?;

        let run = TestRunRecord::pending(
            test_case.project_id,
            RunType::Single,
            Some(test_case_id),
            None,
        );
        self.start(run).await
    }

    /// 只重跑父运行中失败的测试
    pub async fn trigger_rerun_failed(&self, parent_run_id: &str) -> Result<String> {
        let parent = self
            .storage
            .runs()
            .get_by_id(parent_run_id)
            .await?
            .ok_or_else(|| ExecutorError::NotFound(format!("运行 {}", parent_run_id)))?;

        if !parent.run_status()?.is_terminal() {
            return Err(ExecutorError::InvalidState(format!(
                "运行 {} 尚未结束",
                parent_run_id
            )));
        }
        if !parent.test_results()?.iter().any(|r| !r.is_pass()) {
            return Err(ExecutorError::InvalidState(format!(
                "运行 {} 没有失败的测试",
                parent_run_id
            )));
        }

        let run = TestRunRecord::pending(
            parent.project_id,
            RunType::Rerun,
            parent.test_case_id,
            Some(parent.id.clone()),
        );
        self.start(run).await
    }

    async fn start(&self, run: TestRunRecord) -> Result<String> {
        self.storage.runs().create(&run).await?;
        info!("已创建 {} 运行: {}", run.run_type, run.id);

        let orchestrator = Arc::clone(&self.orchestrator);
        let run_id = run.id.clone();
        tokio::spawn(async move {
            orchestrator.execute(&run_id).await;
        });

        Ok(run.id)
    }

    /// 读取运行当前状态
    pub async fn run_status(&self, run_id: &str) -> Result<RunResult> {
        self.storage.read_run(run_id).await
    }

    /// 将未结束的运行标记为 FAILED
    ///
    /// 调用方放弃等待时使用，保证运行记录进入终态。
    /// 运行已经结束时返回 `false`，不改动记录。
    pub async fn abort(&self, run_id: &str, reason: &str) -> Result<bool> {
        let update = RunUpdate::finished(
            RunStatus::Failed,
            Vec::new(),
            format!("[atp] run aborted: {}", reason),
        );
        match self.storage.runs().update_status(run_id, &update).await {
            Ok(()) => {
                warn!("运行 {} 已中止: {}", run_id, reason);
                Ok(true)
            }
            Err(StorageError::InvalidTransition(msg)) => {
                debug!("运行 {} 无需中止: {}", run_id, msg);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 轮询直到运行结束
    pub async fn wait_for_completion(
        &self,
        run_id: &str,
        interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<RunResult> {
        let start = Instant::now();
        loop {
            let result = self.run_status(run_id).await?;
            if result.status.is_terminal() {
                return Ok(result);
            }
            if let Some(limit) = timeout {
                if start.elapsed() >= limit {
                    return Err(ExecutorError::Timeout(limit.as_secs()));
                }
            }
            debug!("运行 {} 当前状态: {}", run_id, result.status);
            tokio::time::sleep(interval).await;
        }
    }
}
