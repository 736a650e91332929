//! Ledger 모듈 - 업로드 중복 제거
//!
//! - Hasher: 바이트 내용 SHA-256 지문
//! - Store: 지문 → 파일명/시각 원장 (SQLite)

mod hasher;
mod store;

// Re-exports
pub use hasher::{fingerprint, Fingerprint, FINGERPRINT_LEN};
pub use store::{FileRecord, Ledger, LedgerStats, LEDGER_FILE_NAME};
