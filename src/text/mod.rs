//! 텍스트 후처리
//!
//! - 인용 표기 제거 (청킹 전, 답변 표시 전)
//! - 도메인 키워드 하이라이트 (HTML / 터미널)

use std::sync::OnceLock;

use regex::Regex;

/// LMD 도메인 키워드
pub const LMD_KEYWORDS: &[&str] = &[
    "LMD",
    "deposition",
    "alloy",
    "substrate",
    "powder",
    "laser",
    "cladding",
    "repair",
    "microstructure",
];

/// HTML 하이라이트 색상
pub const HIGHLIGHT_COLOR: &str = "#FFEB3B";

const ANSI_HIGHLIGHT: &str = "\x1b[1;30;43m";
const ANSI_RESET: &str = "\x1b[0m";

// ============================================================================
// Citation Cleaning
// ============================================================================

struct CitationPatterns {
    numeric: Regex,
    author_year: Regex,
    doi: Regex,
    whitespace: Regex,
}

fn citation_patterns() -> &'static CitationPatterns {
    static PATTERNS: OnceLock<CitationPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| CitationPatterns {
        // [3], [1,2], [4, 5, 6]
        numeric: Regex::new(r"\[\d+(?:,\s?\d+)*\]").expect("valid citation regex"),
        // (Smith et al., 2020), (Smith et al. 2020)
        author_year: Regex::new(r"\([A-Za-z]+ et al\.,? \d{4}\)").expect("valid citation regex"),
        doi: Regex::new(r"doi:\s?\S+").expect("valid doi regex"),
        whitespace: Regex::new(r"\s{2,}").expect("valid whitespace regex"),
    })
}

/// 인용 표기 제거
///
/// 숫자 인용, "저자 et al., 연도" 인용, DOI 참조를 지우고
/// 연속 공백을 하나로 줄인 뒤 앞뒤 공백을 제거합니다.
pub fn clean_citations(text: &str) -> String {
    let p = citation_patterns();
    let text = p.numeric.replace_all(text, "");
    let text = p.author_year.replace_all(&text, "");
    let text = p.doi.replace_all(&text, "");
    let text = p.whitespace.replace_all(&text, " ");
    text.trim().to_string()
}

// ============================================================================
// Keyword Highlighting
// ============================================================================

fn keyword_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let alternatives: Vec<String> = LMD_KEYWORDS.iter().map(|k| regex::escape(k)).collect();
        Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
            .expect("valid keyword regex")
    })
}

/// 키워드를 HTML span으로 감싸기 (대소문자 무시, 단어 단위, 원문 표기 유지)
pub fn highlight_keywords(text: &str) -> String {
    let replacement = format!("<span style='background-color:{}'>$0</span>", HIGHLIGHT_COLOR);
    keyword_pattern()
        .replace_all(text, replacement.as_str())
        .into_owned()
}

/// 키워드를 터미널 색상으로 강조
pub fn highlight_keywords_ansi(text: &str) -> String {
    let replacement = format!("{}$0{}", ANSI_HIGHLIGHT, ANSI_RESET);
    keyword_pattern()
        .replace_all(text, replacement.as_str())
        .into_owned()
}

// ============================================================================
// Tests
// ============================================================================
