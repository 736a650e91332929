//! LLM 모듈 - Ollama 채팅 모델로 답변 생성
//!
//! 프롬프트 한 개를 받아 완성된 텍스트 한 개를 돌려줍니다 (스트리밍 없음).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::OllamaConfig;

// ============================================================================
// LanguageModel Trait
// ============================================================================

/// 언어 모델 트레이트
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 프롬프트로 답변 생성
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Ollama Chat
// ============================================================================

/// Ollama 채팅 구현체
///
/// ref: https://github.com/ollama/ollama/blob/main/docs/api.md#generate-a-chat-completion
#[derive(Debug)]
pub struct OllamaChat {
    client: reqwest::Client,
    chat_endpoint: Url,
    tags_endpoint: Url,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaError {
    error: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

impl OllamaChat {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            chat_endpoint: config.endpoint("api/chat")?,
            tags_endpoint: config.endpoint("api/tags")?,
            model: config.chat_model.clone(),
        })
    }

    /// 서버에 설치된 모델 목록 조회 (연결 확인용)
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.tags_endpoint.clone())
            .send()
            .await
            .with_context(|| format!("Ollama is not reachable at {}", self.tags_endpoint))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Ollama error ({}) while listing models", status);
        }

        let tags: TagsResponse = response
            .json()
            .await
            .context("Failed to parse model list")?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// 설정된 채팅 모델이 설치되어 있는지 확인
    ///
    /// Ollama는 태그 없는 이름을 `:latest`로 취급합니다.
    pub async fn has_model(&self) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models
            .iter()
            .any(|m| m == &self.model || m.strip_suffix(":latest") == Some(self.model.as_str())))
    }
}

#[async_trait]
impl LanguageModel for OllamaChat {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        tracing::debug!("Sending chat request to {} ({})", self.chat_endpoint, self.model);

        let response = self
            .client
            .post(self.chat_endpoint.clone())
            .json(&request)
            .send()
            .await
            .context("Failed to send chat request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            let message = serde_json::from_str::<OllamaError>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            anyhow::bail!("Ollama error ({}): {}", status, message);
        }

        let chat: ChatResponse =
            serde_json::from_str(&body).context("Failed to parse chat response")?;

        Ok(chat.message.content.trim().to_string())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_config() {
        let chat = OllamaChat::new(&OllamaConfig::default()).unwrap();
        assert_eq!(chat.name(), "llama3");
        assert_eq!(chat.chat_endpoint.as_str(), "http://localhost:11434/api/chat");
        assert_eq!(chat.tags_endpoint.as_str(), "http://localhost:11434/api/tags");
    }

    #[test]
    fn test_request_is_not_streamed() {
        let request = ChatRequest {
            model: "llama3",
            messages: vec![ChatMessage {
                role: "user",
                content: "What is LMD?",
            }],
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "What is LMD?");
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"model":"llama3","message":{"role":"assistant","content":" Directed energy. "},"done":true}"#;
        let chat: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(chat.message.content.trim(), "Directed energy.");
    }

    #[tokio::test]
    async fn test_unreachable_host_fails() {
        let config = OllamaConfig {
            host: Url::parse("http://127.0.0.1:1").unwrap(),
            timeout_secs: 1,
            ..Default::default()
        };
        let chat = OllamaChat::new(&config).unwrap();
        assert!(chat.generate("hello").await.is_err());
        assert!(chat.list_models().await.is_err());
    }
}
