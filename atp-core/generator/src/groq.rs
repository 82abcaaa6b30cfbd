//! Groq 客户端 (OpenAI 兼容的 chat completions 接口)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::GeneratorConfig;
use crate::prompt::build_prompt;
use crate::{GeneratorError, Result, TextGenerator};

const SYSTEM_MESSAGE: &str = "You output raw JSON only. No markdown, no commentary.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Groq 云端生成器
pub struct GroqGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GroqGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config.api_key.clone().unwrap_or_default();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeneratorError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url()),
            api_key,
            model: config.model_name(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl TextGenerator for GroqGenerator {
    async fn generate(&self, target_url: &str, custom_instructions: Option<&str>) -> Result<String> {
        let prompt = build_prompt(target_url, custom_instructions);
        info!("Groq 生成测试用例: model={}, target={}", self.model, target_url);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MESSAGE,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    GeneratorError::Unreachable(self.endpoint.clone())
                } else {
                    GeneratorError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::ProviderStatus {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::HttpError(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GeneratorError::EmptyResponse)?;

        debug!("Groq 返回 {} 字节", content.len());
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
