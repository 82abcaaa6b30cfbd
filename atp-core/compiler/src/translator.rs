//! 步骤翻译器
//!
//! 将一条自然语言步骤映射为一条自动化语句。规则按顺序匹配，
//! 第一条命中的规则生效：
//!
//! 1. open / navigate / go to → 导航 (步骤中的 URL 优先于项目 URL)
//! 2. click → 点击 (引号中的文本作为按钮标签)
//! 3. type / enter → 填写输入框 (按 email / password 选择输入框)
//! 4. verify / check / assert → 文本可见断言
//! 5. 其他 → 占位注释
//!
//! 因此 "navigate and click" 这样的步骤总是被当作导航处理。

use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

use crate::statement::{AutomationStatement, CommentKind, InputField, NavigationTarget};

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("valid regex"));
static SINGLE_QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([^']+)'").expect("valid regex"));
static DOUBLE_QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("valid regex"));

const NAVIGATE_KEYWORDS: &[&str] = &["open", "navigate", "go to"];
const INPUT_KEYWORDS: &[&str] = &["type", "enter"];
const ASSERT_KEYWORDS: &[&str] = &["verify", "check", "assert"];

/// 翻译单个步骤
///
/// `unique_suffix` 用于生成脚本内唯一的局部变量名，调用方需保证
/// 每个 (测试序号, 步骤序号) 对应不同的后缀。
///
/// 此函数不会失败：无法识别的步骤退化为占位注释。
pub fn translate(step: &str, unique_suffix: &str) -> AutomationStatement {
    let text = step.trim();
    let lower = text.to_lowercase();

    let statement = if contains_any(&lower, NAVIGATE_KEYWORDS) {
        let target = match extract_url(text) {
            Some(url) => NavigationTarget::Url(url),
            None => NavigationTarget::ProjectUrl,
        };
        AutomationStatement::Navigate { target }
    } else if lower.contains("click") {
        AutomationStatement::Click {
            label: extract_quoted(text),
            binding: format!("locator_{}", unique_suffix),
        }
    } else if contains_any(&lower, INPUT_KEYWORDS) {
        let field = if lower.contains("email") {
            InputField::Email
        } else if lower.contains("password") {
            InputField::Password
        } else {
            InputField::Any
        };
        AutomationStatement::Fill { field }
    } else if contains_any(&lower, ASSERT_KEYWORDS) {
        match extract_quoted(text) {
            Some(quoted) => AutomationStatement::AssertVisible { text: quoted },
            None => AutomationStatement::Comment {
                kind: CommentKind::Verification,
                text: text.to_string(),
            },
        }
    } else {
        AutomationStatement::Comment {
            kind: CommentKind::Step,
            text: text.to_string(),
        }
    };

    trace!("步骤翻译: {:?} -> {:?}", text, statement);
    statement
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// 提取步骤中的第一个绝对 URL，去掉句尾标点
pub fn extract_url(text: &str) -> Option<String> {
    URL_RE
        .find(text)
        .map(|m| {
            m.as_str()
                .trim_end_matches(|c| matches!(c, '\'' | '"' | ')' | ',' | '.' | ';'))
                .to_string()
        })
        .filter(|url| !url.is_empty())
}

/// 提取引号中的文本 (先单引号后双引号)，保留原始大小写
pub fn extract_quoted(text: &str) -> Option<String> {
    SINGLE_QUOTED_RE
        .captures(text)
        .or_else(|| DOUBLE_QUOTED_RE.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}
