//! Vector Store - 벡터 저장소 트레이트 및 유틸리티
//!
//! LanceDB 구현은 `lance.rs`, 테스트/임시 세션용 메모리 구현은 이 파일에 있습니다.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::ledger::Fingerprint;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 청크 고유 ID (UUID v4)
    pub id: String,
    /// 원본 업로드 지문
    pub fingerprint: Fingerprint,
    /// 원본 파일명
    pub source_filename: String,
    /// 청크 인덱스 (0-based)
    pub chunk_index: i32,
    /// PDF 페이지 번호
    pub page: Option<i32>,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub fingerprint: String,
    pub source_filename: String,
    pub chunk_index: i32,
    pub page: Option<i32>,
    pub chunk_text: String,
    /// 유사도 스코어 (높을수록 가까움)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 벡터 배치 삽입 (전부 성공하거나 전부 실패)
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 벡터 검색
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// 벡터 개수 조회
    async fn count(&self) -> Result<usize>;

    /// 특정 지문으로 저장된 청크 개수
    async fn count_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<usize>;
}

// ============================================================================
// MemoryVectorStore
// ============================================================================

/// 메모리 벡터 저장소 (전수 코사인 유사도 검색)
#[derive(Default)]
pub struct MemoryVectorStore {
    entries: RwLock<Vec<VectorEntry>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        let mut stored = self
            .entries
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        stored.extend_from_slice(entries);
        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let stored = self
            .entries
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut results: Vec<SearchResult> = stored
            .iter()
            .map(|e| SearchResult {
                fingerprint: e.fingerprint.to_string(),
                source_filename: e.source_filename.clone(),
                chunk_index: e.chunk_index,
                page: e.page,
                chunk_text: e.chunk_text.clone(),
                similarity: cosine_similarity(query_embedding, &e.embedding),
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        let stored = self
            .entries
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(stored.len())
    }

    async fn count_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<usize> {
        let stored = self
            .entries
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(stored.iter().filter(|e| &e.fingerprint == fingerprint).count())
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산 (-1.0 ~ 1.0)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fingerprint;

    fn entry(fp: &Fingerprint, index: i32, embedding: Vec<f32>) -> VectorEntry {
        VectorEntry {
            id: uuid::Uuid::new_v4().to_string(),
            fingerprint: fp.clone(),
            source_filename: "doc.pdf".to_string(),
            chunk_index: index,
            page: Some(1),
            chunk_text: format!("chunk {}", index),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);
        assert!((cosine_similarity(&a, &[0.0, 1.0, 0.0])).abs() < 0.0001);
        assert!((cosine_similarity(&a, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 0.0001);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_memory_store_search_ranking() {
        let store = MemoryVectorStore::new();
        let fp = fingerprint(b"doc");

        store
            .insert_batch(&[
                entry(&fp, 0, vec![1.0, 0.0]),
                entry(&fp, 1, vec![0.0, 1.0]),
                entry(&fp, 2, vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_index, 0);
        assert_eq!(results[1].chunk_index, 2);
    }

    #[tokio::test]
    async fn test_memory_store_counts() {
        let store = MemoryVectorStore::new();
        let a = fingerprint(b"a");
        let b = fingerprint(b"b");

        store
            .insert_batch(&[entry(&a, 0, vec![1.0]), entry(&a, 1, vec![1.0]), entry(&b, 0, vec![1.0])])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 3);
        assert_eq!(store.count_by_fingerprint(&a).await.unwrap(), 2);
        assert_eq!(store.count_by_fingerprint(&fingerprint(b"c")).await.unwrap(), 0);
    }
}
