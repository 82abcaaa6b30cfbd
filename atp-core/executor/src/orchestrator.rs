//! 运行编排器
//!
//! 状态机: PENDING → RUNNING → {PASSED, FAILED}
//!
//! `execute` 不向调用方返回错误，所有结果都写入运行记录。
//! 只有 PENDING 的运行会被执行，每条运行最多进入一次终态。
//! 临时脚本由 `ScriptFile` 持有，任何退出路径上都会被删除。

use atp_common::RunStatus;
use atp_compiler::ScriptAssembler;
use atp_storage::RunUpdate;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::process::ScriptRunner;
use crate::report::evaluate;
use crate::script_file::ScriptFile;
use crate::store::RunStore;
use crate::{ExecutorError, Result};

/// 运行编排器
pub struct RunOrchestrator {
    store: Arc<dyn RunStore>,
    runner: Arc<dyn ScriptRunner>,
    assembler: ScriptAssembler,
    script_dir: PathBuf,
}

impl RunOrchestrator {
    /// `script_dir`: 临时脚本目录，需位于测试进程能找到的位置
    pub fn new(
        store: Arc<dyn RunStore>,
        runner: Arc<dyn ScriptRunner>,
        script_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            runner,
            assembler: ScriptAssembler::new(),
            script_dir: script_dir.into(),
        }
    }

    pub fn with_assembler(mut self, assembler: ScriptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// 执行一次运行，返回终态
    ///
    /// 已经开始或结束的运行不会再次执行，返回其当前状态。
    pub async fn execute(&self, run_id: &str) -> RunStatus {
        info!("开始执行运行: {}", run_id);

        match self.try_execute(run_id).await {
            Ok(status) => {
                info!("运行 {} 完成: {}", run_id, status);
                status
            }
            Err(ExecutorError::InvalidTransition(msg)) => {
                warn!("运行 {} 未执行: {}", run_id, msg);
                match self.store.read_run(run_id).await {
                    Ok(current) => current.status,
                    Err(e) => {
                        error!("读取运行 {} 失败: {}", run_id, e);
                        RunStatus::Failed
                    }
                }
            }
            Err(e) => {
                error!("运行 {} 执行失败: {}", run_id, e);
                let update = RunUpdate::finished(RunStatus::Failed, Vec::new(), e.to_string());
                if let Err(persist_err) = self.store.update_run_status(run_id, update).await {
                    error!("运行 {} 的失败状态写入失败: {}", run_id, persist_err);
                }
                RunStatus::Failed
            }
        }
    }

    async fn try_execute(&self, run_id: &str) -> Result<RunStatus> {
        let current = self.store.read_run(run_id).await?;
        if current.status != RunStatus::Pending {
            return Err(ExecutorError::InvalidTransition(format!(
                "运行 {} 当前为 {}",
                run_id, current.status
            )));
        }

        let test_cases = self.store.find_test_cases_for_run(run_id).await?;

        if test_cases.is_empty() {
            warn!("运行 {} 没有任何测试用例", run_id);
            self.store
                .update_run_status(
                    run_id,
                    RunUpdate::finished(
                        RunStatus::Failed,
                        Vec::new(),
                        format!("No test cases found for run {}", run_id),
                    ),
                )
                .await?;
            return Ok(RunStatus::Failed);
        }

        let target_url = self.store.find_target_url(run_id).await?;

        self.store
            .update_run_status(run_id, RunUpdate::status(RunStatus::Running))
            .await?;
        info!(
            "运行 {} 进入 RUNNING: {} 个测试用例, 目标 {}",
            run_id,
            test_cases.len(),
            target_url
        );

        let script = self.assembler.assemble(&test_cases, &target_url, run_id);

        let evaluation = {
            let script_file = ScriptFile::create(&self.script_dir, run_id, &script).await?;
            let output = self.runner.run(script_file.path()).await?;
            evaluate(&output)
        };

        self.store
            .update_run_status(
                run_id,
                RunUpdate::finished(evaluation.status, evaluation.results, evaluation.raw_output),
            )
            .await?;

        Ok(evaluation.status)
    }
}
