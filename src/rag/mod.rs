//! 질의 경로 - 검색 + 프롬프트 구성 + 답변 생성

use anyhow::{Context, Result};
use serde::Serialize;

use crate::knowledge::{ScoredChunk, VectorIndex};
use crate::llm::LanguageModel;

/// 기본 검색 개수
pub const DEFAULT_TOP_K: usize = 3;

const SYSTEM_PREAMBLE: &str = "You are an expert in Laser Metal Deposition Process and \
Transformer Architectures. Based on the context below, answer the question:";

// ============================================================================
// Types
// ============================================================================

/// 답변에 사용된 출처
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub source_filename: String,
    pub page: Option<usize>,
    pub chunk_index: usize,
    pub score: f32,
}

impl From<&ScoredChunk> for SourceRef {
    fn from(hit: &ScoredChunk) -> Self {
        Self {
            source_filename: hit.chunk.source_filename.clone(),
            page: hit.chunk.page,
            chunk_index: hit.chunk.chunk_index,
            score: hit.score,
        }
    }
}

/// RAG 답변
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    /// LLM 원문 답변
    pub answer: String,
    /// 프롬프트에 들어간 컨텍스트
    pub context: String,
    pub sources: Vec<SourceRef>,
}

// ============================================================================
// Prompt Building
// ============================================================================

/// 검색 결과를 컨텍스트 문자열로 결합
///
/// 각 결과는 `[파일명] 본문` 형식이며 빈 줄로 구분됩니다.
pub fn build_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| format!("[{}] {}", hit.chunk.source_filename, hit.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 최종 프롬프트
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "{}\n\nContext:\n{}\n\nQuestion:\n{}\n\nAnswer:",
        SYSTEM_PREAMBLE, context, question
    )
}

// ============================================================================
// RagEngine
// ============================================================================

/// 질의 엔진
pub struct RagEngine {
    index: Box<dyn VectorIndex>,
    llm: Box<dyn LanguageModel>,
    top_k: usize,
}

impl RagEngine {
    pub fn new(index: Box<dyn VectorIndex>, llm: Box<dyn LanguageModel>) -> Self {
        Self {
            index,
            llm,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// 검색 개수 설정 (최소 1)
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    pub fn model_name(&self) -> &str {
        self.llm.name()
    }

    /// 질문에 답변
    pub async fn ask(&self, question: &str) -> Result<RagAnswer> {
        let question = question.trim();
        if question.is_empty() {
            anyhow::bail!("Question is empty");
        }

        let hits = self
            .index
            .query(question, self.top_k)
            .await
            .context("Failed to search knowledge index")?;

        if hits.is_empty() {
            tracing::warn!("No indexed chunks matched; answering without context");
        }

        let context = build_context(&hits);
        let prompt = build_prompt(&context, question);

        tracing::debug!(
            "Asking {} with {} context chunks ({} chars)",
            self.llm.name(),
            hits.len(),
            context.len()
        );

        let answer = self
            .llm
            .generate(&prompt)
            .await
            .with_context(|| format!("Language model '{}' failed", self.llm.name()))?;

        Ok(RagAnswer {
            answer,
            context,
            sources: hits.iter().map(SourceRef::from).collect(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
