//! Executor 模块测试
//!
//! 使用内存数据库和一个假的脚本运行器：运行器读取脚本中的测试声明，
//! 标题包含 "FAIL" 的测试报告失败，其余报告通过。

use async_trait::async_trait;
use atp_common::{RunStatus, RunType, TestCase};
use atp_executor::*;
use atp_storage::{Storage, StorageManager, TestRunRecord};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Captured {
    path: PathBuf,
    existed: bool,
    content: String,
}

struct FakeRunner {
    fail_to_spawn: bool,
    calls: Mutex<Vec<Captured>>,
}

impl FakeRunner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_to_spawn: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            fail_to_spawn: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Captured> {
        self.calls.lock().unwrap().clone()
    }
}

/// 提取脚本中所有 `test('name', ...)` 的名字
fn test_names(script: &str) -> Vec<String> {
    script
        .split("\ntest('")
        .skip(1)
        .filter_map(|rest| rest.split("', async").next())
        .map(str::to_string)
        .collect()
}

fn playwright_report(names: &[String]) -> String {
    let specs: Vec<serde_json::Value> = names
        .iter()
        .map(|name| {
            let result = if name.contains("FAIL") {
                serde_json::json!({
                    "status": "failed",
                    "duration": 50,
                    "error": { "message": "expect(locator).toBeVisible() failed" }
                })
            } else {
                serde_json::json!({ "status": "passed", "duration": 100 })
            };
            serde_json::json!({ "title": name, "tests": [{ "results": [result] }] })
        })
        .collect();
    serde_json::json!({ "suites": [{ "title": "spec", "specs": specs }] }).to_string()
}

#[async_trait]
impl ScriptRunner for FakeRunner {
    async fn run(&self, script: &Path) -> Result<ProcessOutput> {
        let content = std::fs::read_to_string(script).unwrap_or_default();
        self.calls.lock().unwrap().push(Captured {
            path: script.to_path_buf(),
            existed: script.exists(),
            content: content.clone(),
        });

        if self.fail_to_spawn {
            return Err(ExecutorError::ProcessSpawnFailed("npx not found".to_string()));
        }

        Ok(ProcessOutput {
            stdout: format!("Running tests\n{}\n", playwright_report(&test_names(&content))),
            exit_code: Some(1),
            ..Default::default()
        })
    }
}

struct Harness {
    storage: Arc<Storage>,
    runner: Arc<FakeRunner>,
    orchestrator: Arc<RunOrchestrator>,
    script_dir: tempfile::TempDir,
}

async fn setup(runner: Arc<FakeRunner>) -> Harness {
    let manager = StorageManager::new_in_memory().await.unwrap();
    let storage = Arc::new(Storage::from_manager(&manager));
    let script_dir = tempfile::tempdir().unwrap();
    let orchestrator = Arc::new(RunOrchestrator::new(
        storage.clone(),
        runner.clone(),
        script_dir.path().join("generated"),
    ));
    Harness {
        storage,
        runner,
        orchestrator,
        script_dir,
    }
}

async fn seed_project(storage: &Storage, cases: &[TestCase]) -> (i64, Vec<i64>) {
    let project_id = storage
        .projects()
        .create("app", "https://app.test", None)
        .await
        .unwrap();
    let ids = storage
        .test_cases()
        .create_many(project_id, cases)
        .await
        .unwrap();
    (project_id, ids)
}

async fn create_suite_run(storage: &Storage, project_id: i64) -> String {
    let run = TestRunRecord::pending(project_id, RunType::Suite, None, None);
    storage.runs().create(&run).await.unwrap();
    run.id
}

fn generated_files(h: &Harness) -> usize {
    std::fs::read_dir(h.script_dir.path().join("generated"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_run_without_tests_fails_without_script() {
    let h = setup(FakeRunner::new()).await;
    let (project_id, _) = seed_project(&h.storage, &[]).await;
    let run_id = create_suite_run(&h.storage, project_id).await;

    let status = h.orchestrator.execute(&run_id).await;

    assert_eq!(status, RunStatus::Failed);
    assert!(h.runner.calls().is_empty());
    assert!(!h.script_dir.path().join("generated").exists());

    let result = h.storage.read_run(&run_id).await.unwrap();
    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.per_test_results.is_empty());
    assert!(result.raw_output.contains("No test cases found"));
}

#[tokio::test]
async fn test_script_removed_when_runner_errors() {
    let h = setup(FakeRunner::broken()).await;
    let (project_id, _) = seed_project(&h.storage, &[TestCase::with_steps("A", &["Wave"])]).await;
    let run_id = create_suite_run(&h.storage, project_id).await;

    let status = h.orchestrator.execute(&run_id).await;

    assert_eq!(status, RunStatus::Failed);
    let calls = h.runner.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].existed);
    assert!(!calls[0].path.exists());
    assert_eq!(generated_files(&h), 0);

    let result = h.storage.read_run(&run_id).await.unwrap();
    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.per_test_results.is_empty());
    assert!(result.raw_output.contains("npx not found"));
}

#[tokio::test]
async fn test_one_failure_fails_the_run() {
    let h = setup(FakeRunner::new()).await;
    let (project_id, _) = seed_project(
        &h.storage,
        &[
            TestCase::with_steps("Home", &["Open the page"]),
            TestCase::with_steps("Search", &["Type a query"]),
            TestCase::with_steps("Checkout FAIL", &["Click 'Pay'"]),
        ],
    )
    .await;
    let run_id = create_suite_run(&h.storage, project_id).await;

    let status = h.orchestrator.execute(&run_id).await;

    assert_eq!(status, RunStatus::Failed);
    let result = h.storage.read_run(&run_id).await.unwrap();
    assert_eq!(result.per_test_results.len(), 3);
    assert_eq!(result.counts(), (2, 1));
    assert!(result.executed_at.is_some());

    let record = h.storage.runs().get_by_id(&run_id).await.unwrap().unwrap();
    assert_eq!((record.total_count, record.pass_count, record.fail_count), (3, 2, 1));
    assert_eq!(record.duration_ms, 250);
    assert_eq!(generated_files(&h), 0);
}

#[tokio::test]
async fn test_all_passing_run_passes() {
    let h = setup(FakeRunner::new()).await;
    let (project_id, _) = seed_project(
        &h.storage,
        &[TestCase::with_steps(
            "Login flow",
            &[
                "Open https://app.test/login",
                "Type the email",
                "Click 'Sign in'",
                "Verify 'Welcome'",
            ],
        )],
    )
    .await;
    let run_id = create_suite_run(&h.storage, project_id).await;

    assert_eq!(h.orchestrator.execute(&run_id).await, RunStatus::Passed);

    let calls = h.runner.calls();
    let script = &calls[0].content;
    assert!(script.contains(&format!("test('[run-{}] Login flow'", run_id)));
    assert!(script.contains("await page.goto('https://app.test/login'"));
    assert!(calls[0]
        .path
        .ends_with(format!("run-{}.spec.js", run_id)));
}

#[tokio::test]
async fn test_unknown_run_is_recorded_nowhere() {
    let h = setup(FakeRunner::new()).await;
    assert_eq!(h.orchestrator.execute("missing").await, RunStatus::Failed);
    assert!(h.runner.calls().is_empty());
}

#[tokio::test]
async fn test_trigger_and_poll() {
    let h = setup(FakeRunner::new()).await;
    let (project_id, ids) = seed_project(
        &h.storage,
        &[
            TestCase::with_steps("Home", &["Open the page"]),
            TestCase::with_steps("Cart FAIL", &["Click 'Cart'"]),
        ],
    )
    .await;
    let service = RunService::new(h.storage.clone(), h.orchestrator.clone());

    // 整个项目
    let suite_id = service.trigger_suite(project_id).await.unwrap();
    let suite = service
        .wait_for_completion(&suite_id, Duration::from_millis(10), Some(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(suite.status, RunStatus::Failed);
    assert_eq!(suite.per_test_results.len(), 2);

    // 单个用例
    let single_id = service.trigger_single(ids[0]).await.unwrap();
    let single = service
        .wait_for_completion(&single_id, Duration::from_millis(10), Some(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(single.status, RunStatus::Passed);
    assert_eq!(single.per_test_results.len(), 1);

    // 只重跑失败的用例
    let rerun_id = service.trigger_rerun_failed(&suite_id).await.unwrap();
    let rerun = service
        .wait_for_completion(&rerun_id, Duration::from_millis(10), Some(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(rerun.per_test_results.len(), 1);
    assert!(rerun.per_test_results[0].test_title.ends_with("Cart FAIL"));

    let record = h.storage.runs().get_by_id(&rerun_id).await.unwrap().unwrap();
    assert_eq!(record.parent_run_id.as_deref(), Some(suite_id.as_str()));
    assert_eq!(record.run_type().unwrap(), RunType::Rerun);

    // 没有失败的运行不能重跑
    assert!(matches!(
        service.trigger_rerun_failed(&single_id).await,
        Err(ExecutorError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_trigger_rejects_unknown_references() {
    let h = setup(FakeRunner::new()).await;
    let service = RunService::new(h.storage.clone(), h.orchestrator.clone());

    assert!(matches!(
        service.trigger_suite(42).await,
        Err(ExecutorError::NotFound(_))
    ));
    assert!(matches!(
        service.trigger_single(42).await,
        Err(ExecutorError::NotFound(_))
    ));
    assert!(matches!(
        service.trigger_rerun_failed("nope").await,
        Err(ExecutorError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_finished_run_is_not_executed_again() {
    let h = setup(FakeRunner::new()).await;
    let (project_id, _) = seed_project(
        &h.storage,
        &[
            TestCase::with_steps("Home", &["Open the page"]),
            TestCase::with_steps("Cart FAIL", &["Click 'Cart'"]),
        ],
    )
    .await;
    let run_id = create_suite_run(&h.storage, project_id).await;

    assert_eq!(h.orchestrator.execute(&run_id).await, RunStatus::Failed);
    let first = h.storage.runs().get_by_id(&run_id).await.unwrap().unwrap();

    assert_eq!(h.orchestrator.execute(&run_id).await, RunStatus::Failed);
    assert_eq!(h.runner.calls().len(), 1);

    let second = h.storage.runs().get_by_id(&run_id).await.unwrap().unwrap();
    assert_eq!(second.executed_at, first.executed_at);
    assert_eq!(second.results, first.results);
    assert_eq!(second.raw_output, first.raw_output);
}

#[tokio::test]
async fn test_abort_marks_unfinished_run_failed() {
    let h = setup(FakeRunner::new()).await;
    let (project_id, _) = seed_project(&h.storage, &[TestCase::with_steps("Home", &["Open"])]).await;
    let service = RunService::new(h.storage.clone(), h.orchestrator.clone());
    let run_id = create_suite_run(&h.storage, project_id).await;

    assert!(service.abort(&run_id, "wait timeout").await.unwrap());
    let result = h.storage.read_run(&run_id).await.unwrap();
    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.raw_output.contains("run aborted: wait timeout"));
    assert!(result.executed_at.is_some());

    // 已结束的运行保持原样，也不会再被执行
    assert!(!service.abort(&run_id, "again").await.unwrap());
    assert_eq!(h.orchestrator.execute(&run_id).await, RunStatus::Failed);
    assert!(h.runner.calls().is_empty());
    let after = h.storage.read_run(&run_id).await.unwrap();
    assert!(after.raw_output.contains("wait timeout"));
}

#[tokio::test]
async fn test_abort_unknown_run_is_not_found() {
    let h = setup(FakeRunner::new()).await;
    let service = RunService::new(h.storage.clone(), h.orchestrator.clone());
    assert!(matches!(
        service.abort("missing", "wait timeout").await,
        Err(ExecutorError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_wait_timeout_then_abort_leaves_terminal_record() {
    let h = setup(FakeRunner::new()).await;
    let (project_id, _) = seed_project(&h.storage, &[TestCase::with_steps("Home", &["Open"])]).await;
    let service = RunService::new(h.storage.clone(), h.orchestrator.clone());
    // 没有编排任务，运行停留在 PENDING
    let run_id = create_suite_run(&h.storage, project_id).await;

    let waited = service
        .wait_for_completion(&run_id, Duration::from_millis(10), Some(Duration::from_millis(50)))
        .await;
    assert!(matches!(waited, Err(ExecutorError::Timeout(_))));

    assert!(service.abort(&run_id, "wait timeout after 0s").await.unwrap());
    let result = service
        .wait_for_completion(&run_id, Duration::from_millis(10), Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert_eq!(result.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_rerun_matches_suffixed_duplicate_titles() {
    let h = setup(FakeRunner::new()).await;
    let (project_id, _) = seed_project(
        &h.storage,
        &[
            TestCase::with_steps("Pay FAIL", &["Click 'Pay'"]),
            TestCase::with_steps("Pay FAIL", &["Click 'Card'"]),
            TestCase::with_steps("Home", &["Open the page"]),
        ],
    )
    .await;
    let service = RunService::new(h.storage.clone(), h.orchestrator.clone());

    let suite_id = service.trigger_suite(project_id).await.unwrap();
    let suite = service
        .wait_for_completion(&suite_id, Duration::from_millis(10), Some(Duration::from_secs(10)))
        .await
        .unwrap();
    let mut titles: Vec<_> = suite
        .per_test_results
        .iter()
        .map(|r| r.test_title.clone())
        .collect();
    titles.sort();
    assert_eq!(titles.len(), 3);
    assert!(titles[2].ends_with("] Pay FAIL (#2)"));

    let rerun_id = service.trigger_rerun_failed(&suite_id).await.unwrap();
    let rerun = service
        .wait_for_completion(&rerun_id, Duration::from_millis(10), Some(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(rerun.per_test_results.len(), 2);
}
