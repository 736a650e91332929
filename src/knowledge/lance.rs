//! LanceDB Vector Store - 청크 임베딩 저장소
//!
//! 청크마다 원본 지문/파일명/페이지를 함께 저장해 원장과 대조할 수 있습니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use crate::ledger::Fingerprint;

use super::vector::{SearchResult, VectorEntry, VectorStore};

/// 벡터 테이블 이름
const TABLE_NAME: &str = "lmd_knowledge";

/// 벡터 저장소 디렉토리 이름
pub const VECTOR_DIR_NAME: &str = "vectors.lance";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
pub struct LanceVectorStore {
    db: Connection,
    dimension: i32,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `dimension` - 임베딩 차원 (기존 테이블과 같아야 함)
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let dimension = i32::try_from(dimension).context("Embedding dimension too large")?;

        Ok(Self { db, dimension })
    }

    /// 벡터 테이블 스키마 생성
    fn create_schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("fingerprint", DataType::Utf8, false),
            Field::new("source_filename", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("page", DataType::Int32, true),
            Field::new("chunk_text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(&self, entries: &[VectorEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        if let Some(bad) = entries
            .iter()
            .find(|e| e.embedding.len() != self.dimension as usize)
        {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {} (chunk {} of {})",
                self.dimension,
                bad.embedding.len(),
                bad.chunk_index,
                bad.source_filename
            );
        }

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        let fingerprints: Vec<&str> = entries.iter().map(|e| e.fingerprint.as_str()).collect();
        let filenames: Vec<&str> = entries.iter().map(|e| e.source_filename.as_str()).collect();
        let chunk_indices: Vec<i32> = entries.iter().map(|e| e.chunk_index).collect();
        let pages: Vec<Option<i32>> = entries.iter().map(|e| e.page).collect();
        let chunk_texts: Vec<&str> = entries.iter().map(|e| e.chunk_text.as_str()).collect();

        // 임베딩을 FixedSizeList로 변환
        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            self.dimension,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(self.create_schema()),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(fingerprints)),
                Arc::new(StringArray::from(filenames)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(Int32Array::from(pages)),
                Arc::new(StringArray::from(chunk_texts)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> Result<bool> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list LanceDB tables")?;
        Ok(names.iter().any(|n| n == TABLE_NAME))
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open vector table")
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = self.entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await? {
            self.open_table()
                .await?
                .add(batches)
                .execute()
                .await
                .context("Failed to add vectors to table")?;
        } else {
            self.db
                .create_table(TABLE_NAME, batches)
                .execute()
                .await
                .context("Failed to create vector table")?;
        }

        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if !self.table_exists().await? {
            return Ok(vec![]);
        }

        let results = self
            .open_table()
            .await?
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = results.try_collect().await?;
        let mut search_results = Vec::new();

        for batch in batches {
            let fingerprints = string_column(&batch, "fingerprint")?;
            let filenames = string_column(&batch, "source_filename")?;
            let chunk_texts = string_column(&batch, "chunk_text")?;

            let chunk_indices = batch
                .column_by_name("chunk_index")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing chunk_index column"))?;

            let pages = batch
                .column_by_name("page")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing page column"))?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                // L2 거리 -> 유사도
                let similarity = 1.0 / (1.0 + distances.value(i));

                search_results.push(SearchResult {
                    fingerprint: fingerprints.value(i).to_string(),
                    source_filename: filenames.value(i).to_string(),
                    chunk_index: chunk_indices.value(i),
                    page: (!pages.is_null(i)).then(|| pages.value(i)),
                    chunk_text: chunk_texts.value(i).to_string(),
                    similarity,
                });
            }
        }

        Ok(search_results)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        self.open_table()
            .await?
            .count_rows(None)
            .await
            .context("Failed to count rows")
    }

    async fn count_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        // Fingerprint는 hex로 검증됨 - 필터 인젝션 불가
        let filter = format!("fingerprint = '{}'", fingerprint.as_str());
        self.open_table()
            .await?
            .count_rows(Some(filter))
            .await
            .context("Failed to count rows for fingerprint")
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

// ============================================================================
// Tests
// ============================================================================
