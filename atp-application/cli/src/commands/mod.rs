//! CLI 命令处理模块

pub mod case;
pub mod common; // 公共工具函数
pub mod compile;
pub mod generate;
pub mod project;
pub mod report;
pub mod run;
