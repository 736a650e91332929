//! Knowledge Index - 임베딩 + 벡터 저장소
//!
//! 업로드 파이프라인과 질의 경로가 사용하는 벡터 인덱스 인터페이스입니다.
//! 모든 청크를 먼저 임베딩한 뒤 한 번의 배치로 기록하므로
//! 실패 시 인덱스에는 아무것도 남지 않습니다.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::OllamaConfig;
use crate::embedding::{EmbeddingProvider, OllamaEmbedding};
use crate::ledger::Fingerprint;

use super::chunker::Chunk;
use super::lance::{LanceVectorStore, VECTOR_DIR_NAME};
use super::vector::{VectorEntry, VectorStore};

// ============================================================================
// Types
// ============================================================================

/// 검색된 청크
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// 원본 업로드 지문
    pub fingerprint: String,
    pub score: f32,
}

// ============================================================================
// VectorIndex Trait
// ============================================================================

/// 벡터 인덱스 인터페이스
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// 한 문서의 청크 추가 (반환: 기록된 청크 수)
    async fn add(&self, fingerprint: &Fingerprint, chunks: &[Chunk]) -> Result<usize>;

    /// 텍스트와 가장 가까운 청크 `k`개
    async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>>;

    /// 전체 청크 수
    async fn count(&self) -> Result<usize>;

    /// 특정 문서의 청크 수
    async fn count_for(&self, fingerprint: &Fingerprint) -> Result<usize>;
}

// ============================================================================
// KnowledgeIndex
// ============================================================================

/// 임베딩 프로바이더 + 벡터 저장소 조합
pub struct KnowledgeIndex {
    embedder: Box<dyn EmbeddingProvider>,
    store: Box<dyn VectorStore>,
}

impl KnowledgeIndex {
    pub fn new(embedder: Box<dyn EmbeddingProvider>, store: Box<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// 데이터 디렉토리의 LanceDB + Ollama 임베딩으로 열기
    pub async fn open(data_dir: &Path, ollama: &OllamaConfig) -> Result<Self> {
        let embedder = OllamaEmbedding::new(ollama).context("Failed to create embedder")?;

        let store = LanceVectorStore::open(&data_dir.join(VECTOR_DIR_NAME), embedder.dimension())
            .await
            .context("Failed to open vector store")?;

        tracing::debug!(
            "Knowledge index ready (embedder={}, dim={})",
            embedder.name(),
            embedder.dimension()
        );

        Ok(Self::new(Box::new(embedder), Box::new(store)))
    }
}

#[async_trait]
impl VectorIndex for KnowledgeIndex {
    async fn add(&self, fingerprint: &Fingerprint, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .context("Failed to embed chunks")?;

        if embeddings.len() != chunks.len() {
            anyhow::bail!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            );
        }

        let entries = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                Ok(VectorEntry {
                    id: uuid::Uuid::new_v4().to_string(),
                    fingerprint: fingerprint.clone(),
                    source_filename: chunk.source_filename.clone(),
                    chunk_index: i32::try_from(chunk.chunk_index)
                        .context("Chunk index out of range")?,
                    page: chunk.page.and_then(|p| i32::try_from(p).ok()),
                    chunk_text: chunk.text.clone(),
                    embedding,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.store
            .insert_batch(&entries)
            .await
            .context("Failed to insert vectors")
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let query_embedding = self
            .embedder
            .embed(text)
            .await
            .context("Failed to embed query")?;

        let results = self.store.search(&query_embedding, k).await?;

        Ok(results
            .into_iter()
            .map(|r| ScoredChunk {
                chunk: Chunk {
                    text: r.chunk_text,
                    source_filename: r.source_filename,
                    chunk_index: r.chunk_index.max(0) as usize,
                    page: r.page.and_then(|p| usize::try_from(p).ok()),
                },
                fingerprint: r.fingerprint,
                score: r.similarity,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        self.store.count().await
    }

    async fn count_for(&self, fingerprint: &Fingerprint) -> Result<usize> {
        self.store.count_by_fingerprint(fingerprint).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::MemoryVectorStore;
    use crate::ledger::fingerprint;

    /// 키워드 출현 여부로 만든 결정적 임베딩
    struct KeywordEmbedding {
        fail: bool,
    }

    const KEYWORDS: [&str; 4] = ["laser", "powder", "substrate", "alloy"];

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.fail {
                anyhow::bail!("embedding backend down");
            }
            let lower = text.to_lowercase();
            Ok(KEYWORDS
                .iter()
                .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                .collect())
        }

        fn dimension(&self) -> usize {
            KEYWORDS.len()
        }

        fn name(&self) -> &str {
            "keyword"
        }
    }

    fn chunk(text: &str, index: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            source_filename: "lmd.pdf".to_string(),
            chunk_index: index,
            page: Some(1),
        }
    }

    fn index(fail: bool) -> KnowledgeIndex {
        KnowledgeIndex::new(
            Box::new(KeywordEmbedding { fail }),
            Box::new(MemoryVectorStore::new()),
        )
    }

    #[tokio::test]
    async fn test_add_and_query() {
        let index = index(false);
        let fp = fingerprint(b"lmd.pdf");

        let added = index
            .add(
                &fp,
                &[
                    chunk("Laser power controls melt pool size", 0),
                    chunk("Powder feed rate affects deposition", 1),
                    chunk("Substrate preheating", 2),
                ],
            )
            .await
            .unwrap();
        assert_eq!(added, 3);
        assert_eq!(index.count_for(&fp).await.unwrap(), 3);

        let hits = index.query("what laser settings?", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.chunk_index, 0);
        assert_eq!(hits[0].chunk.source_filename, "lmd.pdf");
        assert_eq!(hits[0].fingerprint, fp.as_str());
    }

    #[tokio::test]
    async fn test_add_empty_is_noop() {
        let index = index(false);
        assert_eq!(index.add(&fingerprint(b"x"), &[]).await.unwrap(), 0);
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_writes_nothing() {
        let index = index(true);
        let result = index.add(&fingerprint(b"x"), &[chunk("laser", 0)]).await;
        assert!(result.is_err());
        assert_eq!(index.count().await.unwrap(), 0);
    }
}
