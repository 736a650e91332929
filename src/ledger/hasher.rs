//! Content Hasher - 업로드 바이트의 SHA-256 지문
//!
//! 같은 바이트는 파일명/업로드 시각과 무관하게 항상 같은 지문을 갖습니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 지문 길이 (SHA-256 hex)
pub const FINGERPRINT_LEN: usize = 64;

/// 문서 지문 (소문자 hex SHA-256)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// hex 문자열 검증 후 생성 (대소문자 무시, 소문자로 정규화)
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        if s.len() != FINGERPRINT_LEN {
            anyhow::bail!(
                "Invalid fingerprint length: expected {} hex chars, got {}",
                FINGERPRINT_LEN,
                s.len()
            );
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("Invalid fingerprint: non-hex character in {:?}", s);
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 출력용 앞 12자리
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 바이트 내용의 지문 계산
///
/// 빈 입력도 유효한 지문을 반환합니다.
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    let digest = Sha256::digest(bytes);
    Fingerprint(format!("{:x}", digest))
}

// ============================================================================
// Tests
// ============================================================================
