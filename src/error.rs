//! 업로드 파이프라인 에러 분류
//!
//! 업로드 한 건의 실패는 항상 실패한 단계(Stage)와 함께 보고됩니다.
//! 어떤 에러도 프로세스 전체를 중단시키지 않습니다.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Stage
// ============================================================================

/// 업로드 상태 머신의 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// 원본 바이트 수신
    Received,
    /// 지문(fingerprint) 계산 완료
    Hashed,
    /// 이미 원장에 존재 (종료)
    Duplicate,
    /// 신규 문서로 판정
    New,
    /// 텍스트 추출 및 청킹 완료
    Chunked,
    /// 벡터 인덱스 기록 완료
    Indexed,
    /// 원장 기록 완료 (종료)
    Recorded,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Hashed => "hashed",
            Stage::Duplicate => "duplicate",
            Stage::New => "new",
            Stage::Chunked => "chunked",
            Stage::Indexed => "indexed",
            Stage::Recorded => "recorded",
        }
    }

    /// 종료 상태 여부
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Duplicate | Stage::Recorded)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// IngestError
// ============================================================================

/// 업로드 한 건에 치명적인 에러
///
/// 각 변형은 실패한 단계를 [`IngestError::stage`]로 알려줍니다.
#[derive(Debug, Error)]
pub enum IngestError {
    /// 바이트 버퍼를 읽을 수 없음
    #[error("failed to read upload bytes: {0}")]
    Hash(#[source] std::io::Error),

    /// 원장 저장소 접근 실패 (문서는 기록되지 않음)
    #[error("ingestion ledger unavailable during {stage}: {source:#}")]
    LedgerIo {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    /// PDF 손상 또는 지원하지 않는 형식
    #[error("text extraction failed: {0:#}")]
    Extraction(#[source] anyhow::Error),

    /// 벡터 저장소 기록 실패 (원장 미기록, 재시도 가능)
    #[error("vector index write failed: {0:#}")]
    IndexWrite(#[source] anyhow::Error),

    /// 상태 머신 위반
    #[error("invalid upload state transition: {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },
}

impl IngestError {
    /// 실패가 발생한 단계
    pub fn stage(&self) -> Stage {
        match self {
            IngestError::Hash(_) => Stage::Received,
            IngestError::LedgerIo { stage, .. } => *stage,
            IngestError::Extraction(_) => Stage::New,
            IngestError::IndexWrite(_) => Stage::Chunked,
            IngestError::InvalidTransition { from, .. } => *from,
        }
    }

    /// 에러 분류 이름 (로그/출력용)
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Hash(_) => "HashError",
            IngestError::LedgerIo { .. } => "LedgerIOError",
            IngestError::Extraction(_) => "ExtractionError",
            IngestError::IndexWrite(_) => "IndexWriteError",
            IngestError::InvalidTransition { .. } => "InvalidTransition",
        }
    }

    /// 같은 바이트로 다시 업로드하면 성공할 수 있는지 여부
    ///
    /// 어떤 실패도 원장을 기록하지 않으므로 항상 재시도 대상입니다.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, IngestError::InvalidTransition { .. })
    }
}
