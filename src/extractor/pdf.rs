//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 메모리의 PDF 바이트에서 텍스트를 추출합니다.

use anyhow::{Context, Result};
use regex::Regex;

/// PDF 시그니처
const PDF_MAGIC: &[u8] = b"%PDF-";

/// PDF 시그니처로 시작하는지 확인
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// PDF에서 텍스트 추출
///
/// 페이지별로 (페이지 번호, 텍스트) 튜플을 반환합니다. 페이지 번호는 1부터 시작합니다.
/// 텍스트가 없는 PDF(스캔 문서 등)는 빈 목록을 반환합니다.
pub fn extract_text_from_pdf(bytes: &[u8]) -> Result<Vec<(usize, String)>> {
    if !looks_like_pdf(bytes) {
        anyhow::bail!("Not a PDF document (missing %PDF- header)");
    }

    let text = pdf_extract::extract_text_from_mem(bytes)
        .context("Failed to extract text from PDF")?;

    if text.trim().is_empty() {
        tracing::warn!("No text extracted from PDF. It might be a scanned document.");
        return Ok(vec![]);
    }

    Ok(split_pdf_pages(&text)
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i + 1, text))
        .collect())
}

/// PDF 텍스트를 페이지별로 분리
fn split_pdf_pages(text: &str) -> Vec<String> {
    // 폼피드 문자 (\x0c)로 페이지 분리 시도
    let pages: Vec<String> = text
        .split('\x0c')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if pages.len() > 1 {
        return pages;
    }

    // 페이지 구분자 패턴 (예: "--- Page 1 ---")
    let page_pattern = Regex::new(r"(?m)^[\s]*[-=]+[\s]*(?:Page[\s]*)?(\d+)[\s]*[-=]+[\s]*$")
        .expect("Invalid regex");

    if page_pattern.is_match(text) {
        let pages: Vec<String> = page_pattern
            .split(text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if pages.len() > 1 {
            return pages;
        }
    }

    // 분리 실패 - 전체를 하나의 페이지로
    vec![text.trim().to_string()]
}

// ============================================================================
// Tests
// ============================================================================
