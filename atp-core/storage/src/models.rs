use atp_common::{Priority, RunResult, RunStatus, RunType, TestCase, TestResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{Result, StorageError};

/// 项目数据库模型
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectRecord {
    pub id: i64,
    pub name: String,
    /// 被测站点 URL
    pub url: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 测试用例数据库模型
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestCaseRecord {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub steps: String, // JSON array
    pub code: Option<String>,
    pub priority: String, // 'HIGH', 'MEDIUM', 'LOW'
    pub expected_result: Option<String>,
    pub status: String, // 'ACTIVE', 'FAILED'
    pub created_at: DateTime<Utc>,
}

impl TestCaseRecord {
    /// 从领域对象构造待插入的记录
    pub fn from_test_case(project_id: i64, test_case: &TestCase) -> Result<Self> {
        Ok(Self {
            id: 0,
            project_id,
            title: test_case.title.clone(),
            steps: serde_json::to_string(&test_case.steps)?,
            code: test_case.raw_code.clone(),
            priority: test_case.priority.as_str().to_string(),
            expected_result: test_case.expected_result.clone(),
            status: "ACTIVE".to_string(),
            created_at: Utc::now(),
        })
    }

    /// 转换为领域对象
    pub fn to_test_case(&self) -> Result<TestCase> {
        let steps: Vec<String> = serde_json::from_str(&self.steps)?;
        Ok(TestCase {
            title: self.title.clone(),
            steps,
            raw_code: self.code.clone(),
            priority: self.priority.parse().unwrap_or(Priority::Medium),
            expected_result: self.expected_result.clone(),
        })
    }
}

/// 测试运行数据库模型
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestRunRecord {
    pub id: String, // UUID
    pub project_id: i64,
    pub test_case_id: Option<i64>,
    pub run_type: String,
    pub status: String,
    pub parent_run_id: Option<String>,
    pub results: Option<String>, // JSON array
    pub raw_output: Option<String>,
    pub total_count: i64,
    pub pass_count: i64,
    pub fail_count: i64,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl TestRunRecord {
    /// 新的 PENDING 运行记录
    pub fn pending(
        project_id: i64,
        run_type: RunType,
        test_case_id: Option<i64>,
        parent_run_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id,
            test_case_id,
            run_type: run_type.as_str().to_string(),
            status: RunStatus::Pending.as_str().to_string(),
            parent_run_id,
            results: None,
            raw_output: None,
            total_count: 0,
            pass_count: 0,
            fail_count: 0,
            duration_ms: 0,
            created_at: Utc::now(),
            executed_at: None,
        }
    }

    pub fn run_status(&self) -> Result<RunStatus> {
        self.status
            .parse()
            .map_err(|e: String| StorageError::InvalidData(e))
    }

    pub fn run_type(&self) -> Result<RunType> {
        self.run_type
            .parse()
            .map_err(|e: String| StorageError::InvalidData(e))
    }

    /// 解析每个测试的结果 (未执行时为空)
    pub fn test_results(&self) -> Result<Vec<TestResult>> {
        match self.results.as_deref() {
            Some(json) if !json.trim().is_empty() => Ok(serde_json::from_str(json)?),
            _ => Ok(Vec::new()),
        }
    }

    /// 转换为领域层的运行结果
    pub fn to_run_result(&self) -> Result<RunResult> {
        Ok(RunResult {
            run_id: self.id.clone(),
            status: self.run_status()?,
            per_test_results: self.test_results()?,
            raw_output: self.raw_output.clone().unwrap_or_default(),
            executed_at: self.executed_at,
        })
    }
}

/// 运行状态更新
///
/// `None` 字段保持原值。提供 `results` 时同时刷新统计列。
#[derive(Debug, Clone)]
pub struct RunUpdate {
    pub status: RunStatus,
    pub results: Option<Vec<TestResult>>,
    pub raw_output: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl RunUpdate {
    /// 仅修改状态
    pub fn status(status: RunStatus) -> Self {
        Self {
            status,
            results: None,
            raw_output: None,
            executed_at: None,
        }
    }

    /// 终态更新
    pub fn finished(status: RunStatus, results: Vec<TestResult>, raw_output: String) -> Self {
        Self {
            status,
            results: Some(results),
            raw_output: Some(raw_output),
            executed_at: Some(Utc::now()),
        }
    }
}

/// 生成历史数据库模型
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GenerationRecord {
    pub id: i64,
    pub project_id: i64,
    pub prompt: Option<String>,
    pub model: String,
    pub status: String, // 'COMPLETED', 'FAILED'
    pub test_cases: String, // JSON array
    pub created_at: DateTime<Utc>,
}

/// 运行查询过滤器
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub project_id: Option<i64>,
    pub status: Option<RunStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
