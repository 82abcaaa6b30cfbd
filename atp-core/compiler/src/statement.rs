//! 自动化语句定义
//!
//! 每个自然语言步骤被翻译为一条 `AutomationStatement`，
//! 再由具体的渲染器 (见 `render` 模块) 序列化为脚本文本。

/// 导航目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationTarget {
    /// 步骤中出现的绝对 URL
    Url(String),
    /// 项目的目标 URL
    ProjectUrl,
}

/// 输入框类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    Email,
    Password,
    /// 任意 input
    Any,
}

impl InputField {
    /// CSS 选择器
    pub fn selector(&self) -> &'static str {
        match self {
            InputField::Email => "input[type=\"email\"]",
            InputField::Password => "input[type=\"password\"]",
            InputField::Any => "input",
        }
    }
}

/// 注释类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// 无法提取文本的验证步骤
    Verification,
    /// 无法识别的步骤
    Step,
}

impl CommentKind {
    pub fn label(&self) -> &'static str {
        match self {
            CommentKind::Verification => "Verification",
            CommentKind::Step => "Step",
        }
    }
}

/// 一条浏览器自动化语句
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomationStatement {
    Navigate {
        target: NavigationTarget,
    },
    Click {
        /// 引号中的按钮文本，`None` 表示点击第一个可点击元素
        label: Option<String>,
        /// 脚本中的局部变量名，在整个脚本内唯一
        binding: String,
    },
    Fill {
        field: InputField,
    },
    AssertVisible {
        text: String,
    },
    /// 不产生任何行为的占位注释
    Comment {
        kind: CommentKind,
        text: String,
    },
}

impl AutomationStatement {
    pub fn is_navigation(&self) -> bool {
        matches!(self, AutomationStatement::Navigate { .. })
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, AutomationStatement::Comment { .. })
    }
}
