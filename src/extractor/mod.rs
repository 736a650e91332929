//! 콘텐츠 추출 모듈
//!
//! 업로드된 바이트에서 텍스트를 추출합니다.
//! - 텍스트 파일: UTF-8 디코딩
//! - PDF 파일: pdf-extract로 페이지별 추출

pub mod pdf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::collector::FileType;

// ============================================================================
// Extracted Page
// ============================================================================

/// 추출된 페이지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    /// PDF 페이지 번호 (1부터 시작, 텍스트 파일은 None)
    pub page_number: Option<usize>,
    pub text: String,
}

// ============================================================================
// TextExtractor Trait
// ============================================================================

/// 텍스트 추출 인터페이스
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// 바이트에서 페이지별 텍스트 추출
    async fn extract(&self, bytes: &[u8], file_type: FileType) -> Result<Vec<ExtractedPage>>;
}

// ============================================================================
// Content Extractor
// ============================================================================

/// 기본 추출기 (PDF + 텍스트)
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_plain(bytes: &[u8]) -> Result<Vec<ExtractedPage>> {
        let text = std::str::from_utf8(bytes).context("Text file is not valid UTF-8")?;
        // BOM 제거
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        Ok(vec![ExtractedPage {
            page_number: None,
            text: text.to_string(),
        }])
    }

    async fn extract_pdf(bytes: &[u8]) -> Result<Vec<ExtractedPage>> {
        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        // (pdf-extract가 손상된 파일에서 panic하는 경우도 JoinError로 처리됨)
        let bytes = bytes.to_vec();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&bytes))
            .await
            .context("PDF extraction task failed")??;

        Ok(pages
            .into_iter()
            .map(|(page_number, text)| ExtractedPage {
                page_number: Some(page_number),
                text,
            })
            .collect())
    }
}

#[async_trait]
impl TextExtractor for ContentExtractor {
    async fn extract(&self, bytes: &[u8], file_type: FileType) -> Result<Vec<ExtractedPage>> {
        match file_type {
            FileType::Text => Self::extract_plain(bytes),
            FileType::Pdf => Self::extract_pdf(bytes).await,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
