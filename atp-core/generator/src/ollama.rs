//! Ollama 客户端

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::GeneratorConfig;
use crate::prompt::build_prompt;
use crate::{GeneratorError, Result, TextGenerator};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done_reason: Option<String>,
}

impl GenerateResponse {
    /// 模型刚加载完成或输出为空时需要重试
    fn needs_retry(&self) -> bool {
        self.done_reason.as_deref() == Some("load") || self.response.trim().is_empty()
    }
}

/// 本地 Ollama 生成器
pub struct OllamaGenerator {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeneratorError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", config.base_url()),
            model: config.model_name(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn call(&self, prompt: &str) -> Result<GenerateResponse> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
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

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| GeneratorError::HttpError(e.to_string()))
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(&self, target_url: &str, custom_instructions: Option<&str>) -> Result<String> {
        let prompt = build_prompt(target_url, custom_instructions);
        info!("Ollama 生成测试用例: model={}, target={}", self.model, target_url);

        let mut result = self.call(&prompt).await?;
        if result.needs_retry() {
            warn!("Ollama 模型正在加载或返回空结果，重试一次");
            result = self.call(&prompt).await?;
        }

        if result.response.trim().is_empty() {
            return Err(GeneratorError::EmptyResponse);
        }

        debug!("Ollama 返回 {} 字节", result.response.len());
        Ok(result.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config_for(server: &mockito::ServerGuard) -> GeneratorConfig {
        GeneratorConfig {
            url: Some(server.url()),
            timeout_secs: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_generate_returns_response_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "llama3.2",
                "stream": false,
                "options": { "num_predict": 1500 }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response": "{\"testCases\": []}", "done": true, "done_reason": "stop"}"#)
            .create_async()
            .await;

        let generator = OllamaGenerator::new(&config_for(&server)).unwrap();
        let text = generator.generate("https://app.test", None).await.unwrap();

        assert_eq!(text, r#"{"testCases": []}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_retries_once_while_model_loads() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response": "", "done": true, "done_reason": "load"}"#)
            .expect(2)
            .create_async()
            .await;

        let generator = OllamaGenerator::new(&config_for(&server)).unwrap();
        let err = generator.generate("https://app.test", None).await.unwrap_err();

        assert!(matches!(err, GeneratorError::EmptyResponse));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(404)
            .with_body("model not found")
            .create_async()
            .await;

        let generator = OllamaGenerator::new(&config_for(&server)).unwrap();
        let err = generator.generate("https://app.test", None).await.unwrap_err();

        match err {
            GeneratorError::ProviderStatus { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "model not found");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
