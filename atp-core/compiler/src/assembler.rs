//! 脚本组装器
//!
//! 把一组测试用例组装为一个完整的测试脚本。每个用例对应一个测试声明，
//! 测试名以运行 ID 为前缀，便于把报告中的结果关联回运行记录。
//! 清理后重名的用例依次加 ` (#2)`、` (#3)` 后缀，脚本中不会出现同名测试。

use atp_common::{RunRequest, TestCase, TestData};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::heuristic::{is_wrapped_test, looks_like_automation_code, strip_code_fences};
use crate::render::{js_comment, PlaywrightRenderer, ScriptRenderer};
use crate::statement::{AutomationStatement, NavigationTarget};
use crate::translator::translate;

/// 脚本组装器
pub struct ScriptAssembler {
    renderer: Box<dyn ScriptRenderer>,
    data: TestData,
}

impl Default for ScriptAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptAssembler {
    /// 使用 Playwright 渲染器和默认测试数据
    pub fn new() -> Self {
        Self::with_renderer(Box::new(PlaywrightRenderer::default()))
    }

    pub fn with_renderer(renderer: Box<dyn ScriptRenderer>) -> Self {
        Self {
            renderer,
            data: TestData::default(),
        }
    }

    /// 替换输入步骤使用的测试数据
    pub fn with_test_data(mut self, data: TestData) -> Self {
        self.data = data;
        self
    }

    /// 组装运行请求对应的脚本
    pub fn assemble_request(&self, request: &RunRequest) -> String {
        self.assemble(&request.test_cases, &request.target_url, &request.run_id)
    }

    /// 组装脚本
    ///
    /// 总是返回完整的脚本文本：没有可用指令的用例会生成一个只包含
    /// 恒真断言的测试。
    pub fn assemble(&self, test_cases: &[TestCase], target_url: &str, run_id: &str) -> String {
        let mut script = self.renderer.prelude();

        let titles = case_titles(test_cases);
        for (index, (test_case, title)) in test_cases.iter().zip(&titles).enumerate() {
            script.push('\n');
            script.push_str(&self.assemble_case(index, test_case, title, target_url, run_id));
        }

        debug!(
            "脚本组装完成: run={}, 用例数={}, 长度={}",
            run_id,
            test_cases.len(),
            script.len()
        );
        script
    }

    fn assemble_case(
        &self,
        index: usize,
        test_case: &TestCase,
        title: &str,
        target_url: &str,
        run_id: &str,
    ) -> String {
        let name = test_name(run_id, title);

        let code = test_case
            .raw_code
            .as_deref()
            .map(strip_code_fences)
            .unwrap_or_default();

        if looks_like_automation_code(&code) {
            if is_wrapped_test(&code) {
                return format!("/* [Test {}] {} */\n{}\n", index + 1, js_comment(title), code);
            }

            let mut body = self.renderer.fixtures(target_url, &self.data);
            body.extend(self.renderer.render(&AutomationStatement::Navigate {
                target: NavigationTarget::ProjectUrl,
            }));
            body.extend(code.lines().map(|l| l.trim_end().to_string()));
            body.push(self.renderer.trivial_assertion());
            return self.renderer.wrap_test(&name, &body);
        }

        let steps = step_source(test_case, &code);
        let statements: Vec<AutomationStatement> = steps
            .iter()
            .enumerate()
            .map(|(step_index, step)| translate(step, &format!("{}_{}", index, step_index)))
            .collect();
        if !statements.is_empty() && statements.iter().all(AutomationStatement::is_placeholder) {
            warn!("用例 {} 的 {} 个步骤都无法识别，只生成注释", title, statements.len());
        }

        let mut body = self.renderer.fixtures(target_url, &self.data);
        if !statements.iter().any(AutomationStatement::is_navigation) {
            body.extend(self.renderer.render(&AutomationStatement::Navigate {
                target: NavigationTarget::ProjectUrl,
            }));
        }
        for statement in &statements {
            body.extend(self.renderer.render(statement));
        }
        body.push(self.renderer.trivial_assertion());

        self.renderer.wrap_test(&name, &body)
    }
}

/// 步骤来源：显式步骤优先，否则按行拆分原始代码
fn step_source(test_case: &TestCase, code: &str) -> Vec<String> {
    if !test_case.steps.is_empty() {
        return test_case.steps.clone();
    }
    code.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// 去掉会破坏字符串字面量的引号和反斜杠
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | '`' | '\\'))
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

fn display_title(index: usize, title: &str) -> String {
    let sanitized = sanitize_title(title);
    if sanitized.is_empty() {
        format!("Test Case {}", index + 1)
    } else {
        sanitized
    }
}

/// 每个用例在脚本中的标题
///
/// 清理后重名的标题从第二个起加 ` (#N)` 后缀。
pub fn case_titles(test_cases: &[TestCase]) -> Vec<String> {
    let mut used = HashSet::new();
    test_cases
        .iter()
        .enumerate()
        .map(|(index, test_case)| {
            let base = display_title(index, &test_case.title);
            let mut title = base.clone();
            let mut n = 1;
            while !used.insert(title.clone()) {
                n += 1;
                title = format!("{} (#{})", base, n);
            }
            title
        })
        .collect()
}

/// 去掉 `case_titles` 添加的重名后缀
pub fn base_title(title: &str) -> &str {
    if let Some(open) = title.rfind(" (#") {
        let digits = &title[open + 3..];
        if let Some(number) = digits.strip_suffix(')') {
            if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
                return &title[..open];
            }
        }
    }
    title
}

/// 脚本中的测试名
pub fn test_name(run_id: &str, title: &str) -> String {
    format!("[run-{}] {}", sanitize_title(run_id), title)
}

/// 去掉测试名中的运行前缀，得到清理后的用例标题
pub fn strip_run_prefix(name: &str) -> &str {
    match name.strip_prefix("[run-").and_then(|rest| rest.find("] ").map(|i| &rest[i + 2..])) {
        Some(title) => title,
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_tests(script: &str) -> usize {
        script.matches("\ntest(").count()
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title(r#"User's "login" \ path"#), "Users login  path");
        assert_eq!(sanitize_title("  "), "");
    }

    #[test]
    fn test_run_prefix_round_trip() {
        let name = test_name("r1", "Login flow");
        assert_eq!(name, "[run-r1] Login flow");
        assert_eq!(strip_run_prefix(&name), "Login flow");
        assert_eq!(strip_run_prefix("Other"), "Other");
    }

    #[test]
    fn test_degenerate_case_still_passes() {
        let tc = TestCase {
            title: String::new(),
            steps: vec![],
            raw_code: Some(String::new()),
            ..TestCase::with_steps("", &[])
        };
        let script = ScriptAssembler::new().assemble(&[tc], "https://app.test", "r9");
        assert_eq!(count_tests(&script), 1);
        assert!(script.contains("'[run-r9] Test Case 1'"));
        assert!(script.contains("await page.goto(url, { waitUntil: 'networkidle' });"));
        assert!(script.contains("  expect(true).toBeTruthy();\n});"));
    }

    #[test]
    fn test_one_declaration_per_case() {
        let cases = vec![
            TestCase::with_steps("A", &["Click 'x'"]),
            TestCase::with_steps("B", &["Wave"]),
            TestCase::with_code("C", "Open the page\n\nVerify 'Home'"),
        ];
        let script = ScriptAssembler::new().assemble(&cases, "https://app.test", "r2");
        assert_eq!(count_tests(&script), 3);
        assert_eq!(script.matches("expect(true).toBeTruthy();").count(), 3);
        // 按行拆分的原始文本被逐行翻译
        assert!(script.contains("hasText: /Home/i"));
    }

    #[test]
    fn test_raw_code_is_wrapped() {
        let code = "```javascript\nawait page.click('#go');\n```";
        let script = ScriptAssembler::new().assemble(
            &[TestCase::with_code("Raw", code)],
            "https://app.test",
            "r3",
        );
        assert!(script.contains("test('[run-r3] Raw', async ({ page }) => {"));
        assert!(script.contains("  await page.click('#go');\n"));
        assert!(!script.contains("```"));
        let goto = script.find("await page.goto(url").unwrap();
        let click = script.find("await page.click('#go')").unwrap();
        assert!(goto < click);
    }

    #[test]
    fn test_wrapped_code_emitted_verbatim() {
        let code = "test('own', async ({ page }) => {\n  await page.goto('https://x.test');\n});";
        let script = ScriptAssembler::new().assemble(
            &[TestCase::with_code("Mine", code)],
            "https://app.test",
            "r4",
        );
        assert!(script.contains(&format!("/* [Test 1] Mine */\n{}", code)));
        assert!(!script.contains("[run-r4]"));
    }

    #[test]
    fn test_navigation_not_duplicated() {
        let script = ScriptAssembler::new().assemble(
            &[TestCase::with_steps("Nav", &["Go to the home page", "Click 'A'"])],
            "https://app.test",
            "r5",
        );
        assert_eq!(script.matches("await page.goto(").count(), 1);
    }

    #[test]
    fn test_duplicate_titles_get_suffixes() {
        let cases = vec![
            TestCase::with_steps("Login", &["Click 'A'"]),
            TestCase::with_steps("Log'in", &["Click 'B'"]),
            TestCase::with_steps("Login (#2)", &["Click 'C'"]),
            TestCase::with_steps("Other", &["Click 'D'"]),
        ];
        assert_eq!(
            case_titles(&cases),
            vec!["Login", "Login (#2)", "Login (#2) (#2)", "Other"]
        );

        let script = ScriptAssembler::new().assemble(&cases, "https://app.test", "r6");
        assert!(script.contains("test('[run-r6] Login', async"));
        assert!(script.contains("test('[run-r6] Login (#2)', async"));
        assert!(script.contains("test('[run-r6] Login (#2) (#2)', async"));
        assert_eq!(count_tests(&script), 4);
    }

    #[test]
    fn test_base_title() {
        assert_eq!(base_title("Login (#2)"), "Login");
        assert_eq!(base_title("Login (#12)"), "Login");
        assert_eq!(base_title("Login"), "Login");
        assert_eq!(base_title("Login (#x)"), "Login (#x)");
        assert_eq!(base_title("Login (#)"), "Login (#)");
    }
}
