//! 임베딩 모듈 - Ollama를 통한 텍스트 벡터화
//!
//! 로컬 Ollama 서버의 임베딩 모델(기본 all-minilm)로 청크와 질문을 벡터로 변환합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OllamaEmbedding::new(&config.ollama)?;
//! let embedding = embedder.embed("laser cladding").await?;
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::OllamaConfig;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Ollama Embedding
// ============================================================================

/// 일시적 실패 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 500;

/// Ollama 임베딩 구현체
///
/// ref: https://github.com/ollama/ollama/blob/main/docs/api.md#generate-embeddings
#[derive(Debug)]
pub struct OllamaEmbedding {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Ollama 에러 응답
#[derive(Debug, Deserialize)]
struct OllamaError {
    error: String,
}

impl OllamaEmbedding {
    /// 설정으로 생성
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint("api/embeddings")?,
            model: config.embed_model.clone(),
            dimension: config.embed_dimension,
        })
    }

    fn backoff(attempt: u32) -> Duration {
        Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt))
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
        };

        let mut last_error: Option<anyhow::Error> = None;

        // 재시도 루프 (전송 실패, 429, 5xx)
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = Self::backoff(attempt - 1);
                tracing::warn!(
                    "Embedding request failed, retrying in {:?} (attempt {}/{})",
                    backoff,
                    attempt,
                    MAX_RETRIES
                );
                tokio::time::sleep(backoff).await;
            }

            let response = match self
                .client
                .post(self.endpoint.clone())
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    continue;
                }
            };

            let status = response.status();
            // 본문 수신 중 끊긴 경우도 전송 실패로 보고 재시도
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to read embedding response: {}", e));
                    continue;
                }
            };

            if status.is_success() {
                let embed_response: EmbedResponse =
                    serde_json::from_str(&body).context("Failed to parse embedding response")?;

                if embed_response.embedding.len() != self.dimension {
                    anyhow::bail!(
                        "Embedding model '{}' returned {} dimensions, expected {}",
                        self.model,
                        embed_response.embedding.len(),
                        self.dimension
                    );
                }
                return Ok(embed_response.embedding);
            }

            let message = serde_json::from_str::<OllamaError>(&body)
                .map(|e| e.error)
                .unwrap_or(body);

            if status.as_u16() == 429 || status.is_server_error() {
                last_error = Some(anyhow::anyhow!("Ollama error ({}): {}", status, message));
                continue;
            }

            // 다른 에러 (모델 없음 등) - 즉시 실패
            anyhow::bail!("Ollama error ({}): {}", status, message);
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
