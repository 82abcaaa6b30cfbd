//! 模型输出清理
//!
//! 模型输出是不可信文本：可能带 Markdown 围栏、前后说明文字、尾随逗号，
//! 或者直接给出数组 / 单个用例对象。这里尽量从中恢复出测试用例列表，
//! 无法恢复时返回一个合成的失败用例。

use atp_common::{Priority, TestCase};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::{GeneratorError, Result};

static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));

/// 合成失败用例的标题
pub const FALLBACK_TITLE: &str = "AI Generation Failed";

/// 清理结果
#[derive(Debug, Clone)]
pub struct Normalized {
    pub test_cases: Vec<TestCase>,
    /// 是否使用了合成失败用例
    pub fallback: bool,
}

/// 从模型输出中提取测试用例
pub fn extract_test_cases(text: &str) -> Result<Vec<TestCase>> {
    let cleaned = text.replace("```json", "").replace("```", "");

    let json = slice_json(&cleaned)
        .ok_or_else(|| GeneratorError::InvalidOutput("输出中没有 JSON".to_string()))?;

    let json = json.replace(['\n', '\r'], " ");
    let json = TRAILING_COMMA_RE.replace_all(&json, "$1");

    let value: Value = serde_json::from_str(&json)
        .map_err(|e| GeneratorError::InvalidOutput(e.to_string()))?;

    let items = match value {
        Value::Object(mut map) => match map.remove("testCases").or_else(|| map.remove("test_cases")) {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(GeneratorError::InvalidOutput(
                    "testCases 不是数组".to_string(),
                ))
            }
            None if map.contains_key("title") => vec![Value::Object(map)],
            None => {
                return Err(GeneratorError::InvalidOutput(
                    "缺少 testCases 字段".to_string(),
                ))
            }
        },
        Value::Array(items) => items,
        _ => return Err(GeneratorError::InvalidOutput("不是 JSON 对象或数组".to_string())),
    };

    let test_cases: Vec<TestCase> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<TestCase>(item) {
            Ok(tc) => Some(tc),
            Err(e) => {
                debug!("跳过无法解析的用例: {}", e);
                None
            }
        })
        .filter(|tc| !tc.title.trim().is_empty() || !tc.steps.is_empty() || tc.raw_code.is_some())
        .collect();

    if test_cases.is_empty() {
        return Err(GeneratorError::InvalidOutput("没有可用的测试用例".to_string()));
    }

    Ok(test_cases)
}

/// 对象优先，其次数组
fn slice_json(text: &str) -> Option<&str> {
    let object = text
        .find('{')
        .zip(text.rfind('}'))
        .filter(|(start, end)| start < end);
    let array = text
        .find('[')
        .zip(text.rfind(']'))
        .filter(|(start, end)| start < end);

    match (object, array) {
        // 顶层是数组: `[` 出现在第一个 `{` 之前
        (Some((os, _)), Some((as_, ae))) if as_ < os => Some(&text[as_..=ae]),
        (Some((os, oe)), _) => Some(&text[os..=oe]),
        (None, Some((as_, ae))) => Some(&text[as_..=ae]),
        (None, None) => None,
    }
}

/// 生成失败时的合成用例
pub fn fallback_test_case(reason: &str, model: &str) -> TestCase {
    TestCase {
        title: FALLBACK_TITLE.to_string(),
        steps: vec![
            "Check that the LLM provider is reachable".to_string(),
            format!("Verify the model '{}' is available", model),
            format!("Error details: {}", reason),
        ],
        raw_code: None,
        priority: Priority::High,
        expected_result: Some("System should report the error gracefully".to_string()),
    }
}

/// 提取失败时退回合成用例，不会返回错误
pub fn normalize_or_fallback(text: &str, model: &str) -> Normalized {
    match extract_test_cases(text) {
        Ok(test_cases) => Normalized {
            test_cases,
            fallback: false,
        },
        Err(e) => {
            warn!("模型输出无法解析: {}", e);
            Normalized {
                test_cases: vec![fallback_test_case(&e.to_string(), model)],
                fallback: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_json() {
        let text = r#"{"testCases":[{"title":"Login","steps":["Open the page"],"priority":"HIGH"}]}"#;
        let cases = extract_test_cases(text).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].priority, Priority::High);
    }

    #[test]
    fn test_fenced_output_with_prose_and_trailing_commas() {
        let text = "Sure! Here are your tests:\n```json\n{\n  \"testCases\": [\n    {\n      \"title\": \"Search\",\n      \"steps\": [\"Type a query\", \"Verify 'Results'\",],\n    },\n  ]\n}\n```\nLet me know!";
        let cases = extract_test_cases(text).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].steps, vec!["Type a query", "Verify 'Results'"]);
    }

    #[test]
    fn test_bare_array() {
        let text = r#"[{"title":"A","steps":[]},{"title":"B","steps":["Click 'x'"]}]"#;
        let cases = extract_test_cases(text).unwrap();
        assert_eq!(cases.iter().map(|c| c.title.as_str()).collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_single_object() {
        let cases =
            extract_test_cases(r#"{"title":"Only","steps":[{"description":"Open the page"}]}"#)
                .unwrap();
        assert_eq!(cases[0].steps, vec!["Open the page"]);
    }

    #[test]
    fn test_fallback_on_garbage() {
        let normalized = normalize_or_fallback("I cannot help with that.", "llama3.2");
        assert!(normalized.fallback);
        assert_eq!(normalized.test_cases.len(), 1);
        assert_eq!(normalized.test_cases[0].title, FALLBACK_TITLE);
        assert!(normalized.test_cases[0].steps[1].contains("llama3.2"));
    }

    #[test]
    fn test_empty_test_cases_is_failure() {
        assert!(extract_test_cases(r#"{"testCases": []}"#).is_err());
    }
}
