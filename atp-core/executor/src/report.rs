//! 结果解析
//!
//! 从测试进程的 stdout 中找到 JSON 报告 (第一个 `{` 到最后一个 `}`)，
//! 支持两种形态:
//!
//! - Playwright JSON reporter: `suites → specs → tests → results` (suites 可嵌套)
//! - 扁平格式: `{ "tests": [{ "title", "status", "durationMs", "errorMessage" }] }`

use atp_common::{RunStatus, TestResult};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::process::ProcessOutput;
use crate::{ExecutorError, Result};

/// 运行输出的评估结果
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub status: RunStatus,
    pub results: Vec<TestResult>,
    pub raw_output: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Report {
    Playwright(PlaywrightReport),
    Flat(FlatReport),
}

#[derive(Deserialize)]
struct PlaywrightReport {
    suites: Vec<Suite>,
}

#[derive(Deserialize)]
struct Suite {
    #[serde(default)]
    specs: Vec<Spec>,
    #[serde(default)]
    suites: Vec<Suite>,
}

#[derive(Deserialize)]
struct Spec {
    title: String,
    #[serde(default)]
    tests: Vec<SpecTest>,
}

#[derive(Deserialize)]
struct SpecTest {
    #[serde(default)]
    results: Vec<AttemptResult>,
}

#[derive(Deserialize)]
struct AttemptResult {
    status: String,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    error: Option<AttemptError>,
}

#[derive(Deserialize)]
struct AttemptError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct FlatReport {
    tests: Vec<FlatTest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatTest {
    title: String,
    status: String,
    #[serde(default, alias = "duration")]
    duration_ms: f64,
    #[serde(default, alias = "error")]
    error_message: Option<String>,
}

/// 截取 stdout 中的 JSON 文档
pub fn extract_json(stdout: &str) -> Option<&str> {
    let start = stdout.find('{')?;
    let end = stdout.rfind('}')?;
    (start < end).then(|| &stdout[start..=end])
}

/// 解析报告中的每个测试结果
pub fn parse_report(stdout: &str) -> Result<Vec<TestResult>> {
    let json = extract_json(stdout)
        .ok_or_else(|| ExecutorError::ReportParseFailed("输出中没有 JSON 报告".to_string()))?;

    let report: Report = serde_json::from_str(json)
        .map_err(|e| ExecutorError::ReportParseFailed(e.to_string()))?;

    let results = match report {
        Report::Playwright(report) => {
            let mut results = Vec::new();
            for suite in &report.suites {
                collect_suite(suite, &mut results);
            }
            results
        }
        Report::Flat(report) => report
            .tests
            .into_iter()
            .map(|t| {
                let duration = to_millis(t.duration_ms);
                if is_passed(&t.status) {
                    TestResult::passed(&t.title, duration)
                } else {
                    TestResult::failed(&t.title, duration, t.error_message.map(|m| strip_ansi(&m)))
                }
            })
            .collect(),
    };

    debug!("报告解析完成: {} 个测试结果", results.len());
    Ok(results)
}

fn collect_suite(suite: &Suite, out: &mut Vec<TestResult>) {
    for spec in &suite.specs {
        for test in &spec.tests {
            // 有重试时以最后一次尝试为准
            match test.results.last() {
                Some(attempt) if is_passed(&attempt.status) => {
                    out.push(TestResult::passed(&spec.title, to_millis(attempt.duration)))
                }
                Some(attempt) => out.push(TestResult::failed(
                    &spec.title,
                    to_millis(attempt.duration),
                    attempt
                        .error
                        .as_ref()
                        .and_then(|e| e.message.as_deref())
                        .map(strip_ansi)
                        .or_else(|| Some(attempt.status.clone())),
                )),
                None => out.push(TestResult::failed(
                    &spec.title,
                    0,
                    Some("no result reported".to_string()),
                )),
            }
        }
    }
    for child in &suite.suites {
        collect_suite(child, out);
    }
}

fn is_passed(status: &str) -> bool {
    matches!(status.to_ascii_lowercase().as_str(), "passed" | "pass")
}

fn to_millis(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// 去掉终端颜色转义序列
fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// 没有结果或存在失败时为 FAILED
pub fn derive_status(results: &[TestResult]) -> RunStatus {
    if results.is_empty() || results.iter().any(|r| !r.is_pass()) {
        RunStatus::Failed
    } else {
        RunStatus::Passed
    }
}

/// 评估一次进程输出
pub fn evaluate(output: &ProcessOutput) -> Evaluation {
    let mut raw_output = output.stdout.clone();
    if !output.stderr.trim().is_empty() {
        raw_output.push_str("\n--- stderr ---\n");
        raw_output.push_str(&output.stderr);
    }
    if output.truncated {
        raw_output.push_str("\n[atp] output truncated");
    }
    if let Some(e) = &output.read_error {
        raw_output.push_str(&format!("\n[atp] output read error: {}", e));
    }

    let results = match parse_report(&output.stdout) {
        Ok(results) => {
            if results.is_empty() {
                warn!("报告中没有任何测试结果");
                raw_output.push_str("\n[atp] no test results found in runner report");
            }
            results
        }
        Err(e) => {
            warn!("{}", e);
            raw_output.push_str(&format!("\n[atp] {}", e));
            Vec::new()
        }
    };

    Evaluation {
        status: derive_status(&results),
        results,
        raw_output,
    }
}
