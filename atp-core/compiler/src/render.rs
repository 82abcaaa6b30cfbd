//! 脚本渲染器
//!
//! 把 `AutomationStatement` 序列化为具体自动化框架的代码。
//! 所有插入脚本的文本都经过转义，步骤文本不会破坏生成的字符串或正则字面量。

use atp_common::TestData;

use crate::statement::{AutomationStatement, NavigationTarget};

/// 脚本渲染器接口
pub trait ScriptRenderer: Send + Sync {
    /// 脚本开头 (导入、全局配置)
    fn prelude(&self) -> String;

    /// 渲染一条语句，可能产生多行
    fn render(&self, statement: &AutomationStatement) -> Vec<String>;

    /// 测试开头的局部常量 (目标 URL、测试数据)
    fn fixtures(&self, target_url: &str, data: &TestData) -> Vec<String>;

    /// 测试结尾的恒真断言
    fn trivial_assertion(&self) -> String;

    /// 把测试体包装成一个测试声明
    fn wrap_test(&self, name: &str, body: &[String]) -> String;
}

/// Playwright (JavaScript) 渲染器
#[derive(Debug, Clone)]
pub struct PlaywrightRenderer {
    /// 单个动作的超时 (毫秒)
    pub action_timeout_ms: u64,
    /// 页面导航超时 (毫秒)
    pub navigation_timeout_ms: u64,
    /// 点击 / 填写 / 断言的等待时间 (毫秒)
    pub wait_timeout_ms: u64,
    /// 滚动到可见区域的等待时间 (毫秒)
    pub scroll_timeout_ms: u64,
}

impl Default for PlaywrightRenderer {
    fn default() -> Self {
        Self {
            action_timeout_ms: 15000,
            navigation_timeout_ms: 20000,
            wait_timeout_ms: 10000,
            scroll_timeout_ms: 5000,
        }
    }
}

impl PlaywrightRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn goto(&self, target: &str) -> String {
        format!("await page.goto({}, {{ waitUntil: 'networkidle' }});", target)
    }
}

impl ScriptRenderer for PlaywrightRenderer {
    fn prelude(&self) -> String {
        format!(
            "const {{ test, expect }} = require('@playwright/test');\n\n\
             test.use({{ actionTimeout: {}, navigationTimeout: {} }});\n",
            self.action_timeout_ms, self.navigation_timeout_ms
        )
    }

    fn render(&self, statement: &AutomationStatement) -> Vec<String> {
        match statement {
            AutomationStatement::Navigate { target } => {
                let target = match target {
                    NavigationTarget::Url(url) => js_string(url),
                    NavigationTarget::ProjectUrl => "url".to_string(),
                };
                vec![self.goto(&target)]
            }
            AutomationStatement::Click {
                label: Some(label),
                binding,
            } => vec![
                format!(
                    "const {} = page.locator('a, button, [role=\"button\"]').filter({{ hasText: {} }}).first();",
                    binding,
                    js_regex_ci(label)
                ),
                format!(
                    "await {}.scrollIntoViewIfNeeded({{ timeout: {} }}).catch(() => {{}});",
                    binding, self.scroll_timeout_ms
                ),
                format!(
                    "await {}.click({{ timeout: {}, force: true }});",
                    binding, self.wait_timeout_ms
                ),
            ],
            AutomationStatement::Click { label: None, .. } => vec![format!(
                "await page.locator('button, a, [role=\"button\"]').first().click({{ timeout: {}, force: true }});",
                self.wait_timeout_ms
            )],
            // 无论哪种输入框都填 DATA.text
            AutomationStatement::Fill { field } => vec![format!(
                "await page.locator({}).filter({{ visible: true }}).first().fill(DATA.text, {{ timeout: {} }});",
                js_string(field.selector()),
                self.wait_timeout_ms
            )],
            AutomationStatement::AssertVisible { text } => vec![format!(
                "await expect(page.locator('body').filter({{ hasText: {} }}).first()).toBeVisible({{ timeout: {} }});",
                js_regex_ci(text),
                self.wait_timeout_ms
            )],
            AutomationStatement::Comment { kind, text } => {
                vec![format!("/* {}: {} */", kind.label(), js_comment(text))]
            }
        }
    }

    fn fixtures(&self, target_url: &str, data: &TestData) -> Vec<String> {
        vec![
            format!("const url = {};", js_string(target_url)),
            format!(
                "const DATA = {{ email: {}, password: {}, text: {} }};",
                js_string(&data.email),
                js_string(&data.password),
                js_string(&data.text)
            ),
        ]
    }

    fn trivial_assertion(&self) -> String {
        "expect(true).toBeTruthy();".to_string()
    }

    fn wrap_test(&self, name: &str, body: &[String]) -> String {
        let mut out = format!("test({}, async ({{ page }}) => {{\n", js_string(name));
        for line in body {
            if line.is_empty() {
                out.push('\n');
            } else {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push_str("});\n");
        out
    }
}

/// 单引号 JS 字符串字面量
pub fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// 不区分大小写的 JS 正则字面量，文本按字面匹配
pub fn js_regex_ci(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    out.push('/');
    for c in text.chars() {
        match c {
            '\\' | '^' | '$' | '.' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}'
            | '/' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' | '\u{2028}' | '\u{2029}' => out.push(' '),
            c => out.push(c),
        }
    }
    out.push_str("/i");
    out
}

/// 注释内容：去掉 `*` 防止提前闭合，换行压成空格
pub fn js_comment(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '*')
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{CommentKind, InputField};

    #[test]
    fn test_js_string_escaping() {
        assert_eq!(js_string("it's"), r"'it\'s'");
        assert_eq!(js_string("a\\b\nc"), r"'a\\b\nc'");
    }

    #[test]
    fn test_js_regex_escaping() {
        assert_eq!(js_regex_ci("Sign in"), "/Sign in/i");
        assert_eq!(js_regex_ci("a/b (c)?"), r"/a\/b \(c\)\?/i");
    }

    #[test]
    fn test_comment_cannot_close_early() {
        let r = PlaywrightRenderer::new();
        let lines = r.render(&AutomationStatement::Comment {
            kind: CommentKind::Step,
            text: "evil */ code".to_string(),
        });
        assert_eq!(lines, vec!["/* Step: evil / code */".to_string()]);
    }

    #[test]
    fn test_render_click_with_label() {
        let r = PlaywrightRenderer::new();
        let lines = r.render(&AutomationStatement::Click {
            label: Some("Submit".to_string()),
            binding: "locator_0_1".to_string(),
        });
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("const locator_0_1 = page.locator("));
        assert!(lines[0].contains("hasText: /Submit/i"));
        assert!(lines[1].contains(".catch(() => {})"));
        assert!(lines[2].contains("force: true"));
    }

    #[test]
    fn test_render_fill_uses_data_record() {
        let r = PlaywrightRenderer::new();
        let lines = r.render(&AutomationStatement::Fill {
            field: InputField::Password,
        });
        assert_eq!(
            lines[0],
            "await page.locator('input[type=\"password\"]').filter({ visible: true }).first().fill(DATA.text, { timeout: 10000 });"
        );
        let lines = r.render(&AutomationStatement::Fill {
            field: InputField::Email,
        });
        assert!(lines[0].contains("input[type=\"email\"]"));
        assert!(lines[0].contains(".fill(DATA.text, "));
    }

    #[test]
    fn test_render_navigate_literal() {
        let r = PlaywrightRenderer::new();
        let lines = r.render(&AutomationStatement::Navigate {
            target: NavigationTarget::Url("https://a.test/x?q='1'".to_string()),
        });
        assert_eq!(
            lines[0],
            r"await page.goto('https://a.test/x?q=\'1\'', { waitUntil: 'networkidle' });"
        );
    }
}
