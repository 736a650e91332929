//! Knowledge 모듈 - 청킹과 벡터 인덱스
//!
//! - Chunker: 겹치는 고정 윈도우 텍스트 분할
//! - Vector: 벡터 저장소 트레이트 + 메모리 구현
//! - Lance: LanceDB 벡터 저장소 (ANN)
//! - Index: 임베딩 + 저장소를 묶은 벡터 인덱스

mod chunker;
mod index;
mod lance;
mod vector;

// Re-exports
pub use chunker::{chunk, chunk_pages, split_windows, Chunk, ChunkConfig};
pub use index::{KnowledgeIndex, ScoredChunk, VectorIndex};
pub use lance::{LanceVectorStore, VECTOR_DIR_NAME};
pub use vector::{cosine_similarity, MemoryVectorStore, SearchResult, VectorEntry, VectorStore};
