//! ATP 通用类型定义
//!
//! 此 crate 包含 compiler、storage、executor、generator 之间共享的类型。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// 测试用例（由生成器产出，创建后不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// 用例标题
    #[serde(default)]
    pub title: String,

    /// 自然语言步骤 (可以为空)
    #[serde(default, deserialize_with = "deserialize_steps")]
    pub steps: Vec<String>,

    /// 原始代码 (可能是自动化代码，也可能是逐行的自然语言)
    #[serde(default, alias = "code", skip_serializing_if = "Option::is_none")]
    pub raw_code: Option<String>,

    /// 优先级
    #[serde(default)]
    pub priority: Priority,

    /// 期望结果
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<String>,
}

impl TestCase {
    /// 创建只有步骤的测试用例
    pub fn with_steps(title: &str, steps: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            steps: steps.iter().map(|s| s.to_string()).collect(),
            raw_code: None,
            priority: Priority::default(),
            expected_result: None,
        }
    }

    /// 创建只有原始代码的测试用例
    pub fn with_code(title: &str, code: &str) -> Self {
        Self {
            title: title.to_string(),
            steps: Vec::new(),
            raw_code: Some(code.to_string()),
            priority: Priority::default(),
            expected_result: None,
        }
    }
}

/// 生成器输出的步骤既可能是字符串，也可能是 `{ "description": ... }` 对象
fn deserialize_steps<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawStep {
        Text(String),
        Described { description: String },
        Other(serde_json::Value),
    }

    let raw: Option<Vec<RawStep>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|step| match step {
            RawStep::Text(text) => Some(text.trim().to_string()),
            RawStep::Described { description } => Some(description.trim().to_string()),
            RawStep::Other(_) => None,
        })
        .filter(|s| !s.is_empty())
        .collect())
}

/// 用例优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Priority::High),
            "MEDIUM" => Ok(Priority::Medium),
            "LOW" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

// 模型输出的大小写并不稳定 ("Medium", "high")，未知值回退到 MEDIUM
impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .and_then(|s| s.parse().ok())
            .unwrap_or_default())
    }
}

/// 运行状态: PENDING → RUNNING → {PASSED, FAILED}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Pending,
    Running,
    Passed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Passed => "PASSED",
            RunStatus::Failed => "FAILED",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Passed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(RunStatus::Pending),
            "RUNNING" => Ok(RunStatus::Running),
            "PASSED" => Ok(RunStatus::Passed),
            "FAILED" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {}", other)),
        }
    }
}

/// 运行类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunType {
    /// 单个测试用例
    Single,
    /// 项目下的全部测试用例
    Suite,
    /// 仅重跑父运行中失败的用例
    Rerun,
}

impl RunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Single => "SINGLE",
            RunType::Suite => "SUITE",
            RunType::Rerun => "RERUN",
        }
    }
}

impl FromStr for RunType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SINGLE" => Ok(RunType::Single),
            "SUITE" => Ok(RunType::Suite),
            "RERUN" => Ok(RunType::Rerun),
            other => Err(format!("unknown run type: {}", other)),
        }
    }
}

/// 单个测试的结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    Pass,
    Fail,
}

/// 单个测试的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// 测试名称 (运行器报告中的标题)
    pub test_title: String,

    pub status: TestOutcome,

    /// 耗时（毫秒）
    pub duration_ms: u64,

    /// 错误信息
    #[serde(default)]
    pub error: Option<String>,
}

impl TestResult {
    pub fn passed(title: &str, duration_ms: u64) -> Self {
        Self {
            test_title: title.to_string(),
            status: TestOutcome::Pass,
            duration_ms,
            error: None,
        }
    }

    pub fn failed(title: &str, duration_ms: u64, error: Option<String>) -> Self {
        Self {
            test_title: title.to_string(),
            status: TestOutcome::Fail,
            duration_ms,
            error,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == TestOutcome::Pass
    }
}

/// 一次运行的请求 (创建后不再修改)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub run_id: String,
    pub test_cases: Vec<TestCase>,
    pub target_url: String,
}

/// 一次运行的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub run_id: String,
    pub status: RunStatus,
    pub per_test_results: Vec<TestResult>,
    pub raw_output: String,
    pub executed_at: Option<DateTime<Utc>>,
}

impl RunResult {
    /// 通过 / 失败的测试数量
    pub fn counts(&self) -> (usize, usize) {
        let passed = self.per_test_results.iter().filter(|r| r.is_pass()).count();
        (passed, self.per_test_results.len() - passed)
    }
}

/// 输入步骤使用的固定测试数据 (不从步骤文本推导)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestData {
    pub email: String,
    pub password: String,
    pub text: String,
}

impl Default for TestData {
    fn default() -> Self {
        Self {
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
            text: "test".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_from_generator_json() {
        let json = r#"{
            "title": "Login",
            "steps": ["Open the page", {"description": "Click 'Login'"}, "  "],
            "expectedResult": "Dashboard shown",
            "priority": "high"
        }"#;
        let tc: TestCase = serde_json::from_str(json).unwrap();
        assert_eq!(tc.title, "Login");
        assert_eq!(tc.steps, vec!["Open the page", "Click 'Login'"]);
        assert_eq!(tc.priority, Priority::High);
        assert_eq!(tc.expected_result.as_deref(), Some("Dashboard shown"));
        assert!(tc.raw_code.is_none());
    }

    #[test]
    fn test_case_code_alias() {
        let tc: TestCase =
            serde_json::from_str(r#"{"title": "T", "code": "await page.goto(url)"}"#).unwrap();
        assert_eq!(tc.raw_code.as_deref(), Some("await page.goto(url)"));
        assert!(tc.steps.is_empty());
        assert_eq!(tc.priority, Priority::Medium);
    }

    #[test]
    fn test_unknown_priority_falls_back() {
        let tc: TestCase =
            serde_json::from_str(r#"{"title": "T", "priority": "urgent"}"#).unwrap();
        assert_eq!(tc.priority, Priority::Medium);
    }

    #[test]
    fn test_run_status_parse() {
        assert_eq!("passed".parse::<RunStatus>().unwrap(), RunStatus::Passed);
        assert!("done".parse::<RunStatus>().is_err());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn test_run_result_counts() {
        let result = RunResult {
            run_id: "r1".to_string(),
            status: RunStatus::Failed,
            per_test_results: vec![
                TestResult::passed("a", 10),
                TestResult::passed("b", 10),
                TestResult::failed("c", 10, Some("boom".to_string())),
            ],
            raw_output: String::new(),
            executed_at: None,
        };
        assert_eq!(result.counts(), (2, 1));
    }
}
