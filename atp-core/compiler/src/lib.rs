//! ATP 编译器
//!
//! 将生成器产出的自然语言测试步骤确定性地翻译为 Playwright 测试脚本。
//! 本 crate 不做任何 I/O。

pub mod assembler;
pub mod heuristic;
pub mod render;
pub mod statement;
pub mod translator;

pub use assembler::{
    base_title, case_titles, sanitize_title, strip_run_prefix, test_name, ScriptAssembler,
};
pub use heuristic::{is_wrapped_test, looks_like_automation_code, strip_code_fences};
pub use render::{PlaywrightRenderer, ScriptRenderer};
pub use statement::{AutomationStatement, CommentKind, InputField, NavigationTarget};
pub use translator::translate;
