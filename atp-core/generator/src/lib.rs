//! ATP 生成器
//!
//! 调用 LLM (本地 Ollama 或 Groq) 为目标站点生成自然语言测试用例。
//! 模型输出作为不可信文本处理，由 `normalizer` 提取用例。

pub mod config;
pub mod groq;
pub mod normalizer;
pub mod ollama;
pub mod prompt;

pub use config::{GeneratorConfig, Provider};
pub use groq::GroqGenerator;
pub use normalizer::{
    extract_test_cases, fallback_test_case, normalize_or_fallback, Normalized, FALLBACK_TITLE,
};
pub use ollama::OllamaGenerator;
pub use prompt::build_prompt;

use async_trait::async_trait;
use atp_common::TestCase;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("HTTP 错误: {0}")]
    HttpError(String),

    #[error("无法连接 LLM 服务: {0}")]
    Unreachable(String),

    #[error("LLM 服务返回 {status}: {body}")]
    ProviderStatus { status: u16, body: String },

    #[error("LLM 返回空结果")]
    EmptyResponse,

    #[error("模型输出无效: {0}")]
    InvalidOutput(String),

    #[error("配置错误: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;

/// 文本生成器
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// 返回模型的原始输出
    async fn generate(&self, target_url: &str, custom_instructions: Option<&str>) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// 根据配置构造生成器
pub fn build_generator(config: &GeneratorConfig) -> Result<Box<dyn TextGenerator>> {
    config.validate()?;
    Ok(match config.provider {
        Provider::Ollama => Box::new(OllamaGenerator::new(config)?),
        Provider::Groq => Box::new(GroqGenerator::new(config)?),
    })
}

/// 一次生成的结果
#[derive(Debug, Clone)]
pub struct Generation {
    pub test_cases: Vec<TestCase>,
    pub model: String,
    /// 是否为合成失败用例
    pub failed: bool,
    /// 模型原始输出 (请求失败时为错误信息)
    pub raw: String,
}

impl Generation {
    pub fn status(&self) -> &'static str {
        if self.failed {
            "FAILED"
        } else {
            "COMPLETED"
        }
    }
}

/// 生成并清理测试用例，任何失败都退化为一个合成用例
pub async fn generate_test_cases(
    generator: &dyn TextGenerator,
    target_url: &str,
    custom_instructions: Option<&str>,
) -> Generation {
    let model = generator.model_name().to_string();
    match generator.generate(target_url, custom_instructions).await {
        Ok(raw) => {
            let normalized = normalize_or_fallback(&raw, &model);
            Generation {
                test_cases: normalized.test_cases,
                model,
                failed: normalized.fallback,
                raw,
            }
        }
        Err(e) => {
            warn!("测试用例生成失败: {}", e);
            Generation {
                test_cases: vec![fallback_test_case(&e.to_string(), &model)],
                model,
                failed: true,
                raw: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(std::result::Result<&'static str, ()>);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, _: &str, _: Option<&str>) -> Result<String> {
            self.0
                .map(str::to_string)
                .map_err(|_| GeneratorError::Unreachable("http://127.0.0.1:11434".to_string()))
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn test_generation_success() {
        let generator = Canned(Ok(r#"{"testCases":[{"title":"A","steps":["Open the page"]}]}"#));
        let generation = generate_test_cases(&generator, "https://app.test", None).await;
        assert!(!generation.failed);
        assert_eq!(generation.status(), "COMPLETED");
        assert_eq!(generation.test_cases[0].title, "A");
    }

    #[tokio::test]
    async fn test_generation_falls_back_when_unreachable() {
        let generator = Canned(Err(()));
        let generation = generate_test_cases(&generator, "https://app.test", None).await;
        assert!(generation.failed);
        assert_eq!(generation.status(), "FAILED");
        assert_eq!(generation.test_cases[0].title, FALLBACK_TITLE);
        assert!(generation.raw.contains("无法连接"));
    }

    #[test]
    fn test_build_generator_by_provider() {
        let generator = build_generator(&GeneratorConfig::default()).unwrap();
        assert_eq!(generator.model_name(), "llama3.2");

        let groq = build_generator(&GeneratorConfig {
            provider: Provider::Groq,
            api_key: Some("gsk_test".to_string()),
            model: Some("mixtral".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(groq.model_name(), "mixtral");
    }
}
