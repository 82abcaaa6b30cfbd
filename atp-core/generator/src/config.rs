//! 生成器配置
//!
//! 提供方在构造时确定，运行过程中不再读取环境变量。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{GeneratorError, Result};

/// LLM 提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// 本地 Ollama
    #[default]
    Ollama,
    /// Groq 云端 (OpenAI 兼容接口)
    Groq,
}

impl Provider {
    pub fn default_url(&self) -> &'static str {
        match self {
            Provider::Ollama => "http://127.0.0.1:11434",
            Provider::Groq => "https://api.groq.com/openai/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Ollama => "llama3.2",
            Provider::Groq => "llama-3.1-8b-instant",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Ollama => f.write_str("ollama"),
            Provider::Groq => f.write_str("groq"),
        }
    }
}

impl FromStr for Provider {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" | "local" => Ok(Provider::Ollama),
            "groq" | "cloud" => Ok(Provider::Groq),
            other => Err(GeneratorError::ConfigError(format!(
                "未知的 LLM 提供方: {}",
                other
            ))),
        }
    }
}

/// 生成器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub provider: Provider,

    /// 服务地址，缺省使用提供方默认值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// 模型名，缺省使用提供方默认值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Groq API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// 输出 token 上限
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// 请求超时 (秒)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1500
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            url: None,
            model: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GeneratorConfig {
    pub fn base_url(&self) -> String {
        self.url
            .as_deref()
            .unwrap_or(self.provider.default_url())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn model_name(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider == Provider::Groq
            && self.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(GeneratorError::ConfigError(
                "Groq 需要 api_key (或 GROQ_API_KEY 环境变量)".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(GeneratorError::ConfigError(format!(
                "temperature 超出范围: {}",
                self.temperature
            )));
        }
        Ok(())
    }
}
