//! 업로드 조정자 - 중복 제거 + 인덱싱 + 원장 기록
//!
//! 문서 한 건의 상태 머신:
//!
//! ```text
//! RECEIVED → HASHED → DUPLICATE (종료)
//!                   → NEW → CHUNKED → INDEXED → RECORDED (종료)
//! ```
//!
//! 원장 기록은 반드시 인덱스 기록 이후에만 일어납니다.
//! 따라서 원장에 레코드가 있으면 그 문서의 청크는 인덱스에 존재합니다.
//! 인덱스 기록 후 원장 기록이 실패하면 재업로드 시 다시 인덱싱될 수 있습니다.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use crate::collector::FileType;
use crate::error::{IngestError, Stage};
use crate::extractor::TextExtractor;
use crate::knowledge::{chunk_pages, ChunkConfig, VectorIndex};
use crate::ledger::{fingerprint, FileRecord, Fingerprint, Ledger};
use crate::text::clean_citations;

// ============================================================================
// Upload State Machine
// ============================================================================

/// 업로드 상태 추적기
///
/// 허용된 전이만 받아들이며, 지나온 단계를 기록합니다.
#[derive(Debug, Clone)]
pub struct UploadState {
    trail: Vec<Stage>,
}

impl Default for UploadState {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadState {
    pub fn new() -> Self {
        Self {
            trail: vec![Stage::Received],
        }
    }

    /// 현재 단계
    pub fn current(&self) -> Stage {
        *self.trail.last().unwrap_or(&Stage::Received)
    }

    /// 지나온 단계 목록
    pub fn trail(&self) -> &[Stage] {
        &self.trail
    }

    /// 전이 허용 여부
    pub fn can_advance(from: Stage, to: Stage) -> bool {
        matches!(
            (from, to),
            (Stage::Received, Stage::Hashed)
                | (Stage::Hashed, Stage::Duplicate)
                | (Stage::Hashed, Stage::New)
                | (Stage::New, Stage::Chunked)
                | (Stage::Chunked, Stage::Indexed)
                | (Stage::Indexed, Stage::Recorded)
        )
    }

    /// 다음 단계로 전이
    pub fn advance(&mut self, next: Stage) -> Result<(), IngestError> {
        let from = self.current();
        if !Self::can_advance(from, next) {
            return Err(IngestError::InvalidTransition { from, to: next });
        }
        tracing::debug!("Upload stage: {} -> {}", from, next);
        self.trail.push(next);
        Ok(())
    }
}

// ============================================================================
// Upload Report
// ============================================================================

/// 업로드 결과
#[derive(Debug)]
pub enum UploadStatus {
    /// 같은 내용이 이미 인덱싱됨 (추출/인덱싱 생략)
    Duplicate {
        /// 원장의 기존 레코드
        existing: Option<FileRecord>,
    },
    /// 새 문서 인덱싱 및 원장 기록 완료
    Indexed {
        chunks: usize,
        /// false면 다른 세션이 먼저 같은 지문을 기록함
        newly_recorded: bool,
    },
    /// 실패 (원장 미기록, 재시도 가능)
    Failed { stage: Stage, error: IngestError },
}

impl UploadStatus {
    pub fn label(&self) -> &'static str {
        match self {
            UploadStatus::Duplicate { .. } => "DUPLICATE",
            UploadStatus::Indexed { .. } => "INDEXED",
            UploadStatus::Failed { .. } => "FAILED",
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, UploadStatus::Duplicate { .. })
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, UploadStatus::Indexed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, UploadStatus::Failed { .. })
    }
}

/// 업로드 한 건의 보고서
#[derive(Debug)]
pub struct UploadReport {
    pub filename: String,
    /// 바이트를 읽지 못한 경우 None
    pub fingerprint: Option<Fingerprint>,
    pub status: UploadStatus,
    /// 지나온 단계
    pub trail: Vec<Stage>,
}

/// 출력/로그용 요약
#[derive(Debug, Serialize)]
pub struct UploadSummary<'a> {
    pub filename: &'a str,
    pub fingerprint: Option<&'a str>,
    pub status: &'static str,
    /// 인덱싱된 청크 수 (INDEXED)
    pub chunks: Option<usize>,
    /// 기존 레코드의 파일명 (DUPLICATE)
    pub original_filename: Option<&'a str>,
    pub failed_stage: Option<Stage>,
    pub error_kind: Option<&'static str>,
    pub error: Option<String>,
}

impl UploadReport {
    pub fn summary(&self) -> UploadSummary<'_> {
        let mut summary = UploadSummary {
            filename: &self.filename,
            fingerprint: self.fingerprint.as_ref().map(|f| f.as_str()),
            status: self.status.label(),
            chunks: None,
            original_filename: None,
            failed_stage: None,
            error_kind: None,
            error: None,
        };

        match &self.status {
            UploadStatus::Indexed { chunks, .. } => summary.chunks = Some(*chunks),
            UploadStatus::Duplicate { existing } => {
                summary.original_filename = existing.as_ref().map(|r| r.filename.as_str());
            }
            UploadStatus::Failed { stage, error } => {
                summary.failed_stage = Some(*stage);
                summary.error_kind = Some(error.kind());
                summary.error = Some(error.to_string());
            }
        }

        summary
    }
}

/// 원장 기준 중복 여부
///
/// 업로드 없이 확인만 하는 경로(`check` 명령 등)와 조정자가 같은 판정을 사용합니다.
pub fn is_duplicate(ledger: &Ledger, fingerprint: &Fingerprint) -> anyhow::Result<bool> {
    ledger.exists(fingerprint)
}

// ============================================================================
// Upload Coordinator
// ============================================================================

/// 업로드 조정자
///
/// 원장/추출기/인덱스는 호출자가 소유하고 명시적으로 전달합니다.
pub struct UploadCoordinator<'a> {
    ledger: &'a Ledger,
    extractor: &'a dyn TextExtractor,
    index: &'a dyn VectorIndex,
    chunk_config: ChunkConfig,
    clean_citations: bool,
}

impl<'a> UploadCoordinator<'a> {
    pub fn new(
        ledger: &'a Ledger,
        extractor: &'a dyn TextExtractor,
        index: &'a dyn VectorIndex,
        chunk_config: ChunkConfig,
    ) -> Self {
        Self {
            ledger,
            extractor,
            index,
            chunk_config,
            clean_citations: true,
        }
    }

    /// 청킹 전 인용 표기 제거 여부 (기본: 제거)
    pub fn with_citation_cleaning(mut self, enabled: bool) -> Self {
        self.clean_citations = enabled;
        self
    }

    /// 지문이 이미 원장에 있는지 확인
    pub fn is_duplicate(&self, fingerprint: &Fingerprint) -> anyhow::Result<bool> {
        is_duplicate(self.ledger, fingerprint)
    }

    /// 파일 경로에서 업로드
    ///
    /// 파일을 읽지 못하면 RECEIVED 단계 실패(HashError)로 보고합니다.
    pub async fn upload_path(&self, path: &Path) -> UploadReport {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match tokio::fs::read(path).await {
            Ok(bytes) => self.upload(&bytes, &filename).await,
            Err(e) => {
                tracing::warn!("Failed to read upload {:?}: {}", path, e);
                UploadReport {
                    filename,
                    fingerprint: None,
                    status: UploadStatus::Failed {
                        stage: Stage::Received,
                        error: IngestError::Hash(e),
                    },
                    trail: vec![Stage::Received],
                }
            }
        }
    }

    /// 바이트 업로드
    ///
    /// 모든 에러는 여기서 `UploadStatus::Failed`로 변환됩니다.
    pub async fn upload(&self, bytes: &[u8], filename: &str) -> UploadReport {
        let mut state = UploadState::new();
        let mut fp = None;

        let status = match self.run(bytes, filename, &mut state, &mut fp).await {
            Ok(status) => status,
            Err(error) => {
                tracing::warn!(
                    "Upload failed: {} at {} ({}): {}",
                    filename,
                    state.current(),
                    error.kind(),
                    error
                );
                UploadStatus::Failed {
                    stage: state.current(),
                    error,
                }
            }
        };

        UploadReport {
            filename: filename.to_string(),
            fingerprint: fp,
            status,
            trail: state.trail,
        }
    }

    async fn run(
        &self,
        bytes: &[u8],
        filename: &str,
        state: &mut UploadState,
        fp_slot: &mut Option<Fingerprint>,
    ) -> Result<UploadStatus, IngestError> {
        // 1. 지문 계산
        let fp = fingerprint(bytes);
        *fp_slot = Some(fp.clone());
        state.advance(Stage::Hashed)?;

        // 2. 원장 조회 - 중복이면 추출/임베딩 없이 종료
        let exists =
            is_duplicate(self.ledger, &fp).map_err(|source| IngestError::LedgerIo {
                stage: Stage::Hashed,
                source,
            })?;

        if exists {
            state.advance(Stage::Duplicate)?;
            let existing = self.ledger.get(&fp).unwrap_or_else(|e| {
                tracing::warn!("Failed to load existing ledger record: {}", e);
                None
            });
            tracing::info!(
                "Duplicate upload: {} (fingerprint={}, original={:?})",
                filename,
                fp.short(),
                existing.as_ref().map(|r| r.filename.as_str())
            );
            return Ok(UploadStatus::Duplicate { existing });
        }

        state.advance(Stage::New)?;

        // 3. 텍스트 추출 + 청킹
        let file_type = FileType::detect(filename, bytes);
        let pages = self
            .extractor
            .extract(bytes, file_type)
            .await
            .map_err(IngestError::Extraction)?;

        let pages: Vec<(Option<usize>, String)> = pages
            .into_iter()
            .map(|p| {
                let text = if self.clean_citations {
                    clean_citations(&p.text)
                } else {
                    p.text
                };
                (p.page_number, text)
            })
            .filter(|(_, text)| !text.trim().is_empty())
            .collect();

        let chunks = chunk_pages(
            pages.iter().map(|(page, text)| (*page, text.as_str())),
            filename,
            &self.chunk_config,
        );

        if chunks.is_empty() {
            return Err(IngestError::Extraction(anyhow::anyhow!(
                "No extractable text in {} ({})",
                filename,
                file_type.label()
            )));
        }

        state.advance(Stage::Chunked)?;

        // 4. 인덱스 기록 - 실패 시 원장은 건드리지 않음
        let written = self
            .index
            .add(&fp, &chunks)
            .await
            .map_err(IngestError::IndexWrite)?;

        state.advance(Stage::Indexed)?;

        // 5. 원장 기록 (인덱스 기록 이후에만)
        let newly_recorded = self
            .ledger
            .insert(&fp, filename, Utc::now())
            .map_err(|source| IngestError::LedgerIo {
                stage: Stage::Indexed,
                source,
            })?;

        if !newly_recorded {
            tracing::warn!(
                "Fingerprint {} was recorded concurrently by another session; \
                 the index may hold duplicate chunks for {}",
                fp.short(),
                filename
            );
        }

        state.advance(Stage::Recorded)?;

        tracing::info!(
            "Indexed upload: {} (fingerprint={}, chunks={})",
            filename,
            fp.short(),
            written
        );

        Ok(UploadStatus::Indexed {
            chunks: written,
            newly_recorded,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExtractedPage;
    use crate::knowledge::{Chunk, ScoredChunk};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// 바이트를 UTF-8 텍스트로 그대로 반환 (호출 횟수 기록)
    #[derive(Default)]
    struct StubExtractor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextExtractor for StubExtractor {
        async fn extract(
            &self,
            bytes: &[u8],
            _file_type: FileType,
        ) -> anyhow::Result<Vec<ExtractedPage>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = std::str::from_utf8(bytes)?;
            if text.starts_with("CORRUPT") {
                anyhow::bail!("malformed PDF");
            }
            Ok(vec![ExtractedPage {
                page_number: Some(1),
                text: text.to_string(),
            }])
        }
    }

    /// 메모리 인덱스 (실패 주입 가능)
    #[derive(Default)]
    struct FakeIndex {
        chunks: Mutex<Vec<(Fingerprint, Chunk)>>,
        fail_writes: AtomicBool,
    }

    impl FakeIndex {
        fn len(&self) -> usize {
            self.chunks.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn add(&self, fp: &Fingerprint, chunks: &[Chunk]) -> anyhow::Result<usize> {
            if self.fail_writes.load(Ordering::SeqCst) {
                anyhow::bail!("vector store unreachable");
            }
            let mut stored = self.chunks.lock().unwrap();
            stored.extend(chunks.iter().map(|c| (fp.clone(), c.clone())));
            Ok(chunks.len())
        }

        async fn query(&self, _text: &str, _k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
            Ok(vec![])
        }

        async fn count(&self) -> anyhow::Result<usize> {
            Ok(self.len())
        }

        async fn count_for(&self, fp: &Fingerprint) -> anyhow::Result<usize> {
            Ok(self.chunks.lock().unwrap().iter().filter(|(f, _)| f == fp).count())
        }
    }

    struct Fixture {
        _dir: TempDir,
        ledger: Ledger,
        extractor: StubExtractor,
        index: FakeIndex,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let ledger = Ledger::open_in(dir.path()).unwrap();
            Self {
                _dir: dir,
                ledger,
                extractor: StubExtractor::default(),
                index: FakeIndex::default(),
            }
        }

        fn coordinator(&self) -> UploadCoordinator<'_> {
            UploadCoordinator::new(
                &self.ledger,
                &self.extractor,
                &self.index,
                ChunkConfig::new(40, 10).unwrap(),
            )
        }
    }

    const DOC_A: &[u8] = b"Laser metal deposition of Inconel 718 powder onto a steel \
                           substrate produces a dense clad layer with fine microstructure.";

    #[test]
    fn test_state_machine_transitions() {
        let mut state = UploadState::new();
        assert_eq!(state.current(), Stage::Received);

        // 인덱싱 없이 기록으로 건너뛸 수 없음
        assert!(state.advance(Stage::Recorded).is_err());

        state.advance(Stage::Hashed).unwrap();
        state.advance(Stage::New).unwrap();
        assert!(matches!(
            state.advance(Stage::Indexed),
            Err(IngestError::InvalidTransition {
                from: Stage::New,
                to: Stage::Indexed
            })
        ));
        state.advance(Stage::Chunked).unwrap();
        state.advance(Stage::Indexed).unwrap();
        state.advance(Stage::Recorded).unwrap();

        assert!(state.current().is_terminal());
        assert!(state.advance(Stage::Hashed).is_err());
    }

    #[test]
    fn test_duplicate_is_terminal() {
        let mut state = UploadState::new();
        state.advance(Stage::Hashed).unwrap();
        state.advance(Stage::Duplicate).unwrap();
        assert!(state.advance(Stage::New).is_err());
        assert!(state.advance(Stage::Chunked).is_err());
    }

    #[tokio::test]
    async fn test_novel_upload_is_indexed() {
        let fx = Fixture::new();
        let report = fx.coordinator().upload(DOC_A, "doc_a.pdf").await;

        assert!(report.status.is_indexed(), "{:?}", report.status);
        assert_eq!(
            report.trail,
            vec![
                Stage::Received,
                Stage::Hashed,
                Stage::New,
                Stage::Chunked,
                Stage::Indexed,
                Stage::Recorded
            ]
        );

        let fp = report.fingerprint.unwrap();
        assert_eq!(fp, fingerprint(DOC_A));
        assert_eq!(fx.ledger.stats().unwrap().record_count, 1);
        assert_eq!(fx.ledger.get(&fp).unwrap().unwrap().filename, "doc_a.pdf");

        assert!(fx.index.len() > 1);
        assert_eq!(fx.index.count_for(&fp).await.unwrap(), fx.index.len());

        if let UploadStatus::Indexed {
            chunks,
            newly_recorded,
        } = report.status
        {
            assert_eq!(chunks, fx.index.len());
            assert!(newly_recorded);
        }
    }

    #[tokio::test]
    async fn test_same_bytes_other_name_is_duplicate() {
        let fx = Fixture::new();
        let coordinator = fx.coordinator();

        coordinator.upload(DOC_A, "doc_a.pdf").await;
        let chunks_before = fx.index.len();
        let extractions_before = fx.extractor.calls.load(Ordering::SeqCst);

        let report = coordinator.upload(DOC_A, "doc_a_copy.pdf").await;

        match &report.status {
            UploadStatus::Duplicate { existing } => {
                assert_eq!(existing.as_ref().unwrap().filename, "doc_a.pdf");
            }
            other => panic!("expected duplicate, got {:?}", other),
        }
        assert_eq!(
            report.trail,
            vec![Stage::Received, Stage::Hashed, Stage::Duplicate]
        );

        // 새 레코드/청크 없음, 추출도 생략
        assert_eq!(fx.ledger.stats().unwrap().record_count, 1);
        assert_eq!(fx.index.len(), chunks_before);
        assert_eq!(fx.extractor.calls.load(Ordering::SeqCst), extractions_before);
        assert_eq!(
            fx.ledger.get(&fingerprint(DOC_A)).unwrap().unwrap().filename,
            "doc_a.pdf"
        );
    }

    #[tokio::test]
    async fn test_index_failure_leaves_ledger_clean() {
        let fx = Fixture::new();
        fx.index.fail_writes.store(true, Ordering::SeqCst);

        let report = fx.coordinator().upload(DOC_A, "doc_a.pdf").await;

        match &report.status {
            UploadStatus::Failed { stage, error } => {
                assert_eq!(*stage, Stage::Chunked);
                assert_eq!(error.stage(), Stage::Chunked);
                assert!(matches!(error, IngestError::IndexWrite(_)));
                assert!(error.is_retryable());
            }
            other => panic!("expected failure, got {:?}", other),
        }

        let fp = fingerprint(DOC_A);
        assert!(!fx.ledger.exists(&fp).unwrap());
        assert!(!fx.coordinator().is_duplicate(&fp).unwrap());
        assert_eq!(fx.index.len(), 0);

        // 재시도 시 정상 인덱싱
        fx.index.fail_writes.store(false, Ordering::SeqCst);
        let retry = fx.coordinator().upload(DOC_A, "doc_a.pdf").await;
        assert!(retry.status.is_indexed());
        assert!(fx.ledger.exists(&fp).unwrap());
    }

    #[tokio::test]
    async fn test_extraction_failure_reports_stage() {
        let fx = Fixture::new();
        let report = fx.coordinator().upload(b"CORRUPT %%EOF", "broken.pdf").await;

        match &report.status {
            UploadStatus::Failed { stage, error } => {
                assert_eq!(*stage, Stage::New);
                assert_eq!(error.kind(), "ExtractionError");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(fx.ledger.stats().unwrap().record_count, 0);
        assert_eq!(fx.index.len(), 0);
    }

    #[tokio::test]
    async fn test_empty_text_is_not_recorded() {
        let fx = Fixture::new();
        let report = fx.coordinator().upload(b"", "empty.pdf").await;

        assert!(report.status.is_failed());
        // 빈 파일도 유효한 지문을 가짐
        assert_eq!(report.fingerprint, Some(fingerprint(b"")));
        assert_eq!(fx.ledger.stats().unwrap().record_count, 0);
    }

    #[tokio::test]
    async fn test_ledger_failure_does_not_affect_next_upload() {
        let fx = Fixture::new();

        // 원장 테이블 제거 → 조회 실패
        {
            let conn = rusqlite::Connection::open(fx.ledger.db_path()).unwrap();
            conn.execute("DROP TABLE file_hashes", []).unwrap();
        }

        let report = fx.coordinator().upload(DOC_A, "doc_a.pdf").await;
        match &report.status {
            UploadStatus::Failed { stage, error } => {
                assert_eq!(*stage, Stage::Hashed);
                assert_eq!(error.kind(), "LedgerIOError");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(fx.extractor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.index.len(), 0);

        // 새 원장으로 다시 열면 정상 동작
        let healthy = Ledger::open(fx.ledger.db_path()).unwrap();
        let coordinator = UploadCoordinator::new(
            &healthy,
            &fx.extractor,
            &fx.index,
            ChunkConfig::new(40, 10).unwrap(),
        );
        assert!(coordinator.upload(DOC_A, "doc_a.pdf").await.status.is_indexed());
    }

    /// 청크 기록 직후 원장 테이블을 제거하는 인덱스
    struct LedgerBreakingIndex {
        inner: FakeIndex,
        ledger_path: std::path::PathBuf,
    }

    #[async_trait]
    impl VectorIndex for LedgerBreakingIndex {
        async fn add(&self, fp: &Fingerprint, chunks: &[Chunk]) -> anyhow::Result<usize> {
            let written = self.inner.add(fp, chunks).await?;
            let conn = rusqlite::Connection::open(&self.ledger_path)?;
            conn.execute("DROP TABLE file_hashes", [])?;
            Ok(written)
        }

        async fn query(&self, text: &str, k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
            self.inner.query(text, k).await
        }

        async fn count(&self) -> anyhow::Result<usize> {
            self.inner.count().await
        }

        async fn count_for(&self, fp: &Fingerprint) -> anyhow::Result<usize> {
            self.inner.count_for(fp).await
        }
    }

    #[tokio::test]
    async fn test_ledger_write_failure_after_index() {
        let fx = Fixture::new();
        let index = LedgerBreakingIndex {
            inner: FakeIndex::default(),
            ledger_path: fx.ledger.db_path().to_path_buf(),
        };
        let coordinator = UploadCoordinator::new(
            &fx.ledger,
            &fx.extractor,
            &index,
            ChunkConfig::new(40, 10).unwrap(),
        );

        let report = coordinator.upload(DOC_A, "doc_a.pdf").await;

        match &report.status {
            UploadStatus::Failed { stage, error } => {
                assert_eq!(*stage, Stage::Indexed);
                assert_eq!(error.stage(), Stage::Indexed);
                assert_eq!(error.kind(), "LedgerIOError");
            }
            other => panic!("expected failure, got {:?}", other),
        }

        // 청크는 인덱스에 남고 기록 단계에는 도달하지 않음
        let fp = fingerprint(DOC_A);
        assert!(index.inner.len() > 0);
        assert_eq!(index.count_for(&fp).await.unwrap(), index.inner.len());
        assert_eq!(report.trail.last(), Some(&Stage::Indexed));
        assert!(!report.trail.contains(&Stage::Recorded));

        let summary = report.summary();
        assert_eq!(summary.status, "FAILED");
        assert_eq!(summary.failed_stage, Some(Stage::Indexed));
        assert_eq!(summary.error_kind, Some("LedgerIOError"));
    }

    #[tokio::test]
    async fn test_citations_kept_when_cleaning_disabled() {
        let fx = Fixture::new();
        let text = b"Porosity decreased [12] with preheating (Smith et al., 2021).";

        let report = fx
            .coordinator()
            .with_citation_cleaning(false)
            .upload(text, "cited.pdf")
            .await;
        assert!(report.status.is_indexed());

        let joined: String = fx
            .index
            .chunks
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| c.text.clone())
            .collect();
        assert!(joined.contains("[12]"));
        assert!(joined.contains("(Smith et al., 2021)"));
    }

    #[tokio::test]
    async fn test_is_duplicate_matches_coordinator() {
        let fx = Fixture::new();
        let fp = fingerprint(DOC_A);
        assert!(!is_duplicate(&fx.ledger, &fp).unwrap());

        fx.coordinator().upload(DOC_A, "doc_a.pdf").await;

        assert!(is_duplicate(&fx.ledger, &fp).unwrap());
        assert!(fx.coordinator().is_duplicate(&fp).unwrap());
    }

    #[tokio::test]
    async fn test_summary_for_each_status() {
        let fx = Fixture::new();
        let coordinator = fx.coordinator();

        let indexed = coordinator.upload(DOC_A, "doc_a.pdf").await;
        let summary = indexed.summary();
        assert_eq!(summary.status, "INDEXED");
        assert_eq!(summary.chunks, Some(fx.index.len()));
        assert!(summary.failed_stage.is_none());

        let duplicate = coordinator.upload(DOC_A, "doc_a_copy.pdf").await;
        let summary = duplicate.summary();
        assert_eq!(summary.status, "DUPLICATE");
        assert_eq!(summary.filename, "doc_a_copy.pdf");
        assert_eq!(summary.original_filename, Some("doc_a.pdf"));
        assert!(summary.chunks.is_none());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["status"], "DUPLICATE");
        assert_eq!(json["fingerprint"], fingerprint(DOC_A).as_str());
    }

    #[tokio::test]
    async fn test_citations_removed_before_chunking() {
        let fx = Fixture::new();
        let text = b"Porosity decreased [12] with preheating (Smith et al., 2021).";

        fx.coordinator().upload(text, "cited.pdf").await;

        let joined: String = fx
            .index
            .chunks
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| c.text.clone())
            .collect();
        assert!(!joined.contains("[12]"));
        assert!(!joined.contains("et al."));
    }

    #[tokio::test]
    async fn test_upload_path_missing_file() {
        let fx = Fixture::new();
        let report = fx
            .coordinator()
            .upload_path(Path::new("/definitely/not/here.pdf"))
            .await;

        match &report.status {
            UploadStatus::Failed { stage, error } => {
                assert_eq!(*stage, Stage::Received);
                assert_eq!(error.kind(), "HashError");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(report.fingerprint.is_none());
        assert_eq!(report.filename, "here.pdf");
    }

    #[tokio::test]
    async fn test_upload_path_reads_file() {
        let fx = Fixture::new();
        let path = fx._dir.path().join("notes.txt");
        std::fs::write(&path, DOC_A).unwrap();

        let report = fx.coordinator().upload_path(&path).await;
        assert!(report.status.is_indexed());
        assert_eq!(report.summary().status, "INDEXED");
        assert_eq!(report.summary().filename, "notes.txt");
    }
}
