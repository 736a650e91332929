//! 설정 - 환경변수 기반
//!
//! | 변수 | 기본값 |
//! |------|--------|
//! | `LMD_RAG_DATA_DIR` | `<local data dir>/.lmd-rag` |
//! | `OLLAMA_HOST` | `http://localhost:11434` |
//! | `LMD_RAG_CHAT_MODEL` | `llama3` |
//! | `LMD_RAG_EMBED_MODEL` | `all-minilm` |
//! | `LMD_RAG_EMBED_DIM` | `384` |
//! | `LMD_RAG_CHUNK_SIZE` | `800` |
//! | `LMD_RAG_CHUNK_OVERLAP` | `100` |
//! | `LMD_RAG_TOP_K` | `3` |

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use url::Url;

use crate::knowledge::ChunkConfig;

pub const ENV_DATA_DIR: &str = "LMD_RAG_DATA_DIR";
pub const ENV_OLLAMA_HOST: &str = "OLLAMA_HOST";
pub const ENV_CHAT_MODEL: &str = "LMD_RAG_CHAT_MODEL";
pub const ENV_EMBED_MODEL: &str = "LMD_RAG_EMBED_MODEL";
pub const ENV_EMBED_DIM: &str = "LMD_RAG_EMBED_DIM";
pub const ENV_CHUNK_SIZE: &str = "LMD_RAG_CHUNK_SIZE";
pub const ENV_CHUNK_OVERLAP: &str = "LMD_RAG_CHUNK_OVERLAP";
pub const ENV_TOP_K: &str = "LMD_RAG_TOP_K";

const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
const DEFAULT_CHAT_MODEL: &str = "llama3";
/// all-MiniLM-L6-v2 (Ollama 이름)
const DEFAULT_EMBED_MODEL: &str = "all-minilm";
const DEFAULT_EMBED_DIM: usize = 384;
const DEFAULT_TOP_K: usize = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// Data Directory
// ============================================================================

/// 기본 데이터 디렉토리 경로 (~/.lmd-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lmd-rag")
}

// ============================================================================
// Config Types
// ============================================================================

/// Ollama 연결 설정
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub host: Url,
    pub chat_model: String,
    pub embed_model: String,
    pub embed_dimension: usize,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: Url::parse(DEFAULT_OLLAMA_HOST).expect("default Ollama host is a valid URL"),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            embed_dimension: DEFAULT_EMBED_DIM,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl OllamaConfig {
    /// API 엔드포인트 URL (`api/chat`, `api/embeddings` 등)
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.host.clone();
        // Url::join은 마지막 세그먼트를 대체하므로 '/'로 끝나게 맞춤
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(path)
            .with_context(|| format!("Invalid Ollama endpoint: {}", path))
    }
}

/// 전체 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub ollama: OllamaConfig,
    pub chunk: ChunkConfig,
    pub top_k: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            ollama: OllamaConfig::default(),
            chunk: ChunkConfig::default(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl AppConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 조회 함수로 설정 로드 (빈 값은 미설정으로 취급)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let data_dir = get(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let host = match get(ENV_OLLAMA_HOST) {
            Some(raw) => parse_host(&raw)?,
            None => defaults.ollama.host,
        };

        let ollama = OllamaConfig {
            host,
            chat_model: get(ENV_CHAT_MODEL).unwrap_or(defaults.ollama.chat_model),
            embed_model: get(ENV_EMBED_MODEL).unwrap_or(defaults.ollama.embed_model),
            embed_dimension: parse_var(&get, ENV_EMBED_DIM, DEFAULT_EMBED_DIM)?,
            timeout_secs: defaults.ollama.timeout_secs,
        };

        if ollama.embed_dimension == 0 {
            anyhow::bail!("{} must be > 0", ENV_EMBED_DIM);
        }

        let chunk = ChunkConfig::new(
            parse_var(&get, ENV_CHUNK_SIZE, defaults.chunk.window_size())?,
            parse_var(&get, ENV_CHUNK_OVERLAP, defaults.chunk.overlap())?,
        )
        .with_context(|| format!("Invalid {} / {}", ENV_CHUNK_SIZE, ENV_CHUNK_OVERLAP))?;

        let top_k = parse_var(&get, ENV_TOP_K, DEFAULT_TOP_K)?;
        if top_k == 0 {
            anyhow::bail!("{} must be >= 1", ENV_TOP_K);
        }

        Ok(Self {
            data_dir,
            ollama,
            chunk,
            top_k,
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_var<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

/// `OLLAMA_HOST`는 스킴 없이 `host:port`로 지정되는 경우가 많음
fn parse_host(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    let url = Url::parse(&with_scheme)
        .with_context(|| format!("Invalid value for {}: {:?}", ENV_OLLAMA_HOST, raw))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => anyhow::bail!("Unsupported {} scheme: {}", ENV_OLLAMA_HOST, other),
    }
}

// ============================================================================
// Tests
// ============================================================================
