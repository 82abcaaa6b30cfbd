//! 代码识别启发式
//!
//! 这些判断故意保持粗糙：误判是可以接受的，行为必须稳定可测。

/// 异步操作标记
const ASYNC_MARKER: &str = "await ";

/// 判断文本是否已经是自动化代码
///
/// 当且仅当文本同时包含 `await ` 和至少一个 `(` 时返回 true。
pub fn looks_like_automation_code(text: &str) -> bool {
    text.contains(ASYNC_MARKER) && text.contains('(')
}

/// 判断代码是否已经是完整的测试声明
pub fn is_wrapped_test(code: &str) -> bool {
    code.trim_start().starts_with("test(") || code.contains("test.describe(")
}

/// 去掉 Markdown 代码块围栏 (```javascript / ```)
pub fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_code() {
        assert!(looks_like_automation_code("await page.click('a')"));
        assert!(!looks_like_automation_code("Click the (blue) button"));
        assert!(!looks_like_automation_code("await the result"));
        // 已知误判：自然语言也可能命中
        assert!(looks_like_automation_code("Wait, await (something) happens"));
    }

    #[test]
    fn test_wrapped_detection() {
        assert!(is_wrapped_test("  test('x', async ({ page }) => {})"));
        assert!(is_wrapped_test("// suite\ntest.describe('s', () => {})"));
        assert!(!is_wrapped_test("await page.goto(url)"));
    }

    #[test]
    fn test_strip_fences() {
        let text = "```javascript\nawait page.goto(url);\n```\n";
        assert_eq!(strip_code_fences(text), "await page.goto(url);");
        assert_eq!(strip_code_fences("plain"), "plain");
    }
}
