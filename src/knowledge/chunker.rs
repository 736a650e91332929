//! Text Chunking Module
//!
//! 추출된 문서 텍스트를 고정 크기 윈도우로 분할합니다.
//! 연속된 청크는 정확히 `overlap` 문자만큼 겹치며, 마지막 청크만 짧을 수 있습니다.
//! 크기는 바이트가 아닌 문자(Unicode scalar) 단위입니다.

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 윈도우 크기 (문자 수)
    window_size: usize,
    /// 오버랩 크기 (문자 수)
    overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            window_size: 800,
            overlap: 100,
        }
    }
}

impl ChunkConfig {
    /// 설정 생성 (`window_size > 0`, `overlap < window_size`)
    pub fn new(window_size: usize, overlap: usize) -> Result<Self> {
        if window_size == 0 {
            anyhow::bail!("Chunk window size must be > 0");
        }
        if overlap >= window_size {
            anyhow::bail!(
                "Chunk overlap ({}) must be smaller than window size ({})",
                overlap,
                window_size
            );
        }
        Ok(Self {
            window_size,
            overlap,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// 다음 청크 시작까지의 거리
    fn step(&self) -> usize {
        self.window_size - self.overlap
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// 벡터 인덱스에 저장되는 문서 조각
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 원문 텍스트의 연속 구간
    pub text: String,
    /// 업로드 당시 파일명
    pub source_filename: String,
    /// 문서 내 순번 (0부터, 페이지를 넘어 연속)
    pub chunk_index: usize,
    /// PDF 페이지 번호 (1부터)
    pub page: Option<usize>,
}

// ============================================================================
// Chunking
// ============================================================================

/// 텍스트를 겹치는 윈도우로 분할 (구간 문자열만 반환)
///
/// 빈 텍스트는 빈 목록을 반환합니다.
pub fn split_windows<'a>(text: &'a str, config: &ChunkConfig) -> Vec<&'a str> {
    // 문자 경계의 바이트 오프셋 (끝 위치 포함)
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_count = bounds.len();
    bounds.push(text.len());

    let mut windows = Vec::new();
    let mut start = 0;

    while start < char_count {
        let end = (start + config.window_size).min(char_count);
        windows.push(&text[bounds[start]..bounds[end]]);

        if end == char_count {
            break;
        }
        start += config.step();
    }

    windows
}

/// 텍스트를 [`Chunk`] 목록으로 분할
pub fn chunk(text: &str, source_filename: &str, config: &ChunkConfig) -> Vec<Chunk> {
    split_windows(text, config)
        .into_iter()
        .enumerate()
        .map(|(i, window)| Chunk {
            text: window.to_string(),
            source_filename: source_filename.to_string(),
            chunk_index: i,
            page: None,
        })
        .collect()
}

/// 페이지별 텍스트를 청킹 (청크 순번은 문서 전체에서 연속)
pub fn chunk_pages<'a, I>(pages: I, source_filename: &str, config: &ChunkConfig) -> Vec<Chunk>
where
    I: IntoIterator<Item = (Option<usize>, &'a str)>,
{
    let mut chunks = Vec::new();

    for (page, text) in pages {
        for window in split_windows(text, config) {
            chunks.push(Chunk {
                text: window.to_string(),
                source_filename: source_filename.to_string(),
                chunk_index: chunks.len(),
                page,
            });
        }
    }

    chunks
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// 오버랩을 제거하고 원문 복원
    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&c.text);
            } else {
                out.extend(c.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_config_validation() {
        assert!(ChunkConfig::new(0, 0).is_err());
        assert!(ChunkConfig::new(10, 10).is_err());
        assert!(ChunkConfig::new(10, 11).is_err());
        assert!(ChunkConfig::new(10, 9).is_ok());
        assert!(ChunkConfig::new(1, 0).is_ok());

        let default = ChunkConfig::default();
        assert_eq!(default.window_size(), 800);
        assert_eq!(default.overlap(), 100);
    }

    #[test]
    fn test_chunk_empty() {
        let chunks = chunk("", "a.pdf", &ChunkConfig::default());
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_chunk_shorter_than_window() {
        let chunks = chunk("short text", "a.pdf", &ChunkConfig::new(50, 10).unwrap());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
        assert_eq!(chunks[0].source_filename, "a.pdf");
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_chunk_exact_windows() {
        let config = ChunkConfig::new(4, 1).unwrap();
        let texts: Vec<String> = chunk("abcdefghij", "a.pdf", &config)
            .into_iter()
            .map(|c| c.text)
            .collect();

        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn test_last_chunk_may_be_shorter() {
        let config = ChunkConfig::new(4, 1).unwrap();
        let texts: Vec<String> = chunk("abcdefgh", "a.pdf", &config)
            .into_iter()
            .map(|c| c.text)
            .collect();

        assert_eq!(texts, vec!["abcd", "defg", "gh"]);
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let config = ChunkConfig::new(10, 3).unwrap();
        let text = "Laser metal deposition builds parts layer by layer.";
        let chunks = chunk(text, "lmd.pdf", &config);

        for pair in chunks.windows(2) {
            let prev_tail: String = pair[0].text.chars().skip(7).collect();
            let next_head: String = pair[1].text.chars().take(3).collect();
            assert_eq!(prev_tail, next_head);
        }
    }

    #[test]
    fn test_coverage_reconstructs_text() {
        let text = "Directed energy deposition (DED) melts powder with a laser. \
                    Substrate preheating reduces residual stress in the clad layer.";

        for (window, overlap) in [(1, 0), (5, 0), (7, 3), (16, 15), (30, 5), (500, 100)] {
            let config = ChunkConfig::new(window, overlap).unwrap();
            let chunks = chunk(text, "ded.pdf", &config);
            assert_eq!(reconstruct(&chunks, overlap), text, "W={} O={}", window, overlap);
        }
    }

    #[test]
    fn test_coverage_multibyte() {
        let text = "레이저 금속 적층 — Ti-6Al-4V 분말 ✓";
        let config = ChunkConfig::new(6, 2).unwrap();
        let chunks = chunk(text, "ko.pdf", &config);

        assert!(chunks.iter().all(|c| c.text.chars().count() <= 6));
        assert_eq!(reconstruct(&chunks, 2), text);
    }

    #[test]
    fn test_chunk_deterministic() {
        let config = ChunkConfig::new(12, 4).unwrap();
        let text = "cladding repair of turbine blades";
        assert_eq!(chunk(text, "x.pdf", &config), chunk(text, "x.pdf", &config));
    }

    #[test]
    fn test_chunk_pages_continuous_index() {
        let config = ChunkConfig::new(4, 0).unwrap();
        let pages = vec![(Some(1), "abcdefgh"), (Some(2), "ijkl")];
        let chunks = chunk_pages(pages, "p.pdf", &config);

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(chunks[1].page, Some(1));
        assert_eq!(chunks[2].page, Some(2));
    }
}
