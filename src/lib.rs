//! lmd-rag - 로컬 LMD 문헌 RAG 어시스턴트
//!
//! 업로드된 PDF/텍스트를 SHA-256 지문으로 중복 제거한 뒤
//! LanceDB 벡터 인덱스에 저장하고, Ollama 모델로 질문에 답합니다.
//! 원장(SQLite)은 인덱스 기록이 끝난 문서만 기록합니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod knowledge;
pub mod ledger;
pub mod llm;
pub mod rag;
pub mod session;
pub mod text;

// Re-exports
pub use config::{get_data_dir, AppConfig, OllamaConfig};
pub use embedding::{EmbeddingProvider, OllamaEmbedding};
pub use error::{IngestError, Stage};
pub use extractor::{ContentExtractor, ExtractedPage, TextExtractor};
pub use ingest::{UploadCoordinator, UploadReport, UploadState, UploadStatus};
pub use knowledge::{
    chunk, Chunk, ChunkConfig, KnowledgeIndex, LanceVectorStore, ScoredChunk, VectorIndex,
};
pub use ledger::{fingerprint, FileRecord, Fingerprint, Ledger, LedgerStats};
pub use llm::{LanguageModel, OllamaChat};
pub use rag::{RagAnswer, RagEngine};
pub use session::{ConversationHistory, Feedback};
pub use text::{clean_citations, highlight_keywords, highlight_keywords_ansi};
