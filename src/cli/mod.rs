//! CLI 모듈
//!
//! lmd-rag CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::collector::{CollectedFile, CollectorConfig, FileCollector};
use crate::config::AppConfig;
use crate::extractor::ContentExtractor;
use crate::ingest::{is_duplicate, UploadCoordinator, UploadStatus, UploadSummary};
use crate::knowledge::{KnowledgeIndex, VectorIndex, VECTOR_DIR_NAME};
use crate::ledger::{fingerprint, Fingerprint, Ledger};
use crate::llm::OllamaChat;
use crate::rag::{RagAnswer, RagEngine};
use crate::session::{ConversationHistory, Feedback, HISTORY_DISPLAY_LIMIT};
use crate::text::{clean_citations, highlight_keywords_ansi};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "lmd-rag")]
#[command(version, about = "LMD 문헌 RAG 어시스턴트", long_about = None)]
pub struct Cli {
    /// 데이터 디렉토리 (기본: LMD_RAG_DATA_DIR 또는 ~/.lmd-rag)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// 답변 생성 모델 (기본: LMD_RAG_CHAT_MODEL 또는 llama3)
    #[arg(long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// PDF/텍스트 파일을 지식베이스에 업로드 (중복 내용은 건너뜀)
    Ingest {
        /// 업로드할 파일 경로
        #[arg(long, conflicts_with = "dir")]
        file: Option<PathBuf>,

        /// 업로드할 폴더 경로 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// PDF만 업로드
        #[arg(long)]
        pdf_only: bool,

        /// 숨김 파일 포함
        #[arg(long)]
        include_hidden: bool,

        /// 인용 표기([1], (Smith et al., 2020), doi:)를 지우지 않고 인덱싱
        #[arg(long)]
        keep_citations: bool,
    },

    /// 질문하기
    Query {
        /// 질문
        question: String,

        /// 검색할 청크 수
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// 프롬프트에 사용된 컨텍스트 출력
        #[arg(long)]
        show_context: bool,

        /// 키워드 하이라이트 없이 출력
        #[arg(long)]
        plain: bool,
    },

    /// 대화형 질의 (:+ / :- 피드백, :history, :quit)
    Chat {
        /// 검색할 청크 수
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// 키워드 하이라이트 없이 출력
        #[arg(long)]
        plain: bool,
    },

    /// 업로드 원장 목록 (최신순)
    List {
        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// 문서가 이미 업로드되었는지 확인
    Check {
        /// 확인할 파일 경로
        #[arg(required_unless_present = "fingerprint")]
        path: Option<PathBuf>,

        /// 지문(SHA-256 hex)으로 확인
        #[arg(long, conflicts_with = "path")]
        fingerprint: Option<String>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Ingest {
            file,
            dir,
            pdf_only,
            include_hidden,
            keep_citations,
        } => cmd_ingest(&config, file, dir, pdf_only, include_hidden, keep_citations).await,
        Commands::Query {
            question,
            top_k,
            show_context,
            plain,
        } => cmd_query(&config, &question, top_k, show_context, plain).await,
        Commands::Chat { top_k, plain } => cmd_chat(&config, top_k, plain).await,
        Commands::List { limit } => cmd_list(&config, limit),
        Commands::Check { path, fingerprint } => cmd_check(&config, path, fingerprint).await,
        Commands::Status => cmd_status(&config).await,
    }
}

/// 환경변수 설정 + CLI 인자 덮어쓰기
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().context("설정 로드 실패")?;

    if let Some(ref data_dir) = cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(ref model) = cli.model {
        config.ollama.chat_model = model.clone();
    }

    tracing::debug!("Using data directory {:?}", config.data_dir);
    Ok(config)
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 업로드 명령어 (ingest)
///
/// 파일마다 지문을 계산해 원장에 없는 문서만 추출/인덱싱합니다.
async fn cmd_ingest(
    config: &AppConfig,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    pdf_only: bool,
    include_hidden: bool,
    keep_citations: bool,
) -> Result<()> {
    let collector = FileCollector::new(CollectorConfig {
        pdf_only,
        include_hidden,
        ..Default::default()
    });

    let files: Vec<CollectedFile> = if let Some(ref file_path) = file {
        match collector.collect_file(file_path)? {
            Some(f) => vec![f],
            None => {
                println!("[!] 지원하지 않는 파일 형식 또는 크기 초과: {:?}", file_path);
                return Ok(());
            }
        }
    } else if let Some(ref dir_path) = dir {
        collector.collect_directory(dir_path)?
    } else {
        bail!("--file 또는 --dir를 지정해야 합니다");
    };

    if files.is_empty() {
        println!("[!] 업로드할 파일이 없습니다.");
        return Ok(());
    }

    let total_size: u64 = files.iter().map(|f| f.size).sum();
    println!("[*] 업로드 대상: {} 파일 ({})", files.len(), format_bytes(total_size as usize));
    println!();

    let ledger = Ledger::open_in(&config.data_dir).context("업로드 원장 열기 실패")?;
    let index = KnowledgeIndex::open(&config.data_dir, &config.ollama)
        .await
        .context("벡터 인덱스 열기 실패")?;
    let extractor = ContentExtractor::new();
    let coordinator = UploadCoordinator::new(&ledger, &extractor, &index, config.chunk)
        .with_citation_cleaning(!keep_citations);

    let mut indexed = 0;
    let mut skipped = 0;
    let mut failed = 0;

    for (i, collected) in files.iter().enumerate() {
        print!(
            "[{}/{}] [{}] {}... ",
            i + 1,
            files.len(),
            collected.file_type.label(),
            collected.file_name()
        );
        std::io::stdout().flush().ok();

        let report = coordinator.upload_path(&collected.path).await;
        let summary = report.summary();
        println!("{}", format_upload_line(&summary));
        tracing::debug!(
            "Upload summary: {}",
            serde_json::to_string(&summary).unwrap_or_default()
        );

        match report.status {
            UploadStatus::Indexed { .. } => indexed += 1,
            UploadStatus::Duplicate { .. } => skipped += 1,
            UploadStatus::Failed { .. } => failed += 1,
        }
    }

    println!();
    println!(
        "[OK] 완료: 신규 {}, 중복 {}, 실패 {}",
        indexed, skipped, failed
    );

    if failed > 0 {
        println!("     실패한 파일은 원장에 기록되지 않았으므로 다시 업로드할 수 있습니다.");
    }

    Ok(())
}

/// RAG 엔진 구성 (LanceDB 인덱스 + Ollama 채팅)
async fn open_engine(config: &AppConfig, top_k: Option<usize>) -> Result<RagEngine> {
    let index = KnowledgeIndex::open(&config.data_dir, &config.ollama)
        .await
        .context("벡터 인덱스 열기 실패")?;
    let llm = OllamaChat::new(&config.ollama).context("Ollama 클라이언트 생성 실패")?;

    Ok(RagEngine::new(Box::new(index), Box::new(llm)).with_top_k(top_k.unwrap_or(config.top_k)))
}

/// 질의 명령어 (query)
async fn cmd_query(
    config: &AppConfig,
    question: &str,
    top_k: Option<usize>,
    show_context: bool,
    plain: bool,
) -> Result<()> {
    let engine = open_engine(config, top_k).await?;

    println!("[*] {} 모델로 답변 생성 중: \"{}\"", engine.model_name(), question);

    let answer = engine.ask(question).await.context("질의 실패")?;
    print_answer(&answer, plain);

    if show_context {
        println!("--- Context ---");
        if answer.context.is_empty() {
            println!("(없음)");
        } else {
            println!("{}", answer.context);
        }
    }

    Ok(())
}

/// 대화형 질의 명령어 (chat)
async fn cmd_chat(config: &AppConfig, top_k: Option<usize>, plain: bool) -> Result<()> {
    let engine = open_engine(config, top_k).await?;
    let mut history = ConversationHistory::new();

    println!("LMD Knowledge Assistant ({})", engine.model_name());
    println!("  :+ 도움됨 / :- 도움 안 됨 / :history 최근 질문 / :quit 종료");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("질문> ");
        std::io::stdout().flush().ok();

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let input = line.trim();

        match input {
            "" => continue,
            ":quit" | ":q" | ":exit" => break,
            ":+" | ":-" => {
                let feedback = if input == ":+" {
                    Feedback::Helpful
                } else {
                    Feedback::NotHelpful
                };
                match history.rate_last(feedback) {
                    Some(ack) => println!("[OK] {} - {}", feedback.label(), ack),
                    None => println!("[!] 평가할 답변이 없습니다."),
                }
            }
            ":history" => print_history(&history),
            question => match engine.ask(question).await {
                Ok(answer) => {
                    print_answer(&answer, plain);
                    history.push(question, clean_citations(&answer.answer));
                }
                Err(e) => println!("[!] 질의 실패: {:#}", e),
            },
        }
    }

    println!("[*] 세션 종료 ({} 질문)", history.len());
    Ok(())
}

/// 목록 명령어 (list)
fn cmd_list(config: &AppConfig, limit: usize) -> Result<()> {
    let ledger = match Ledger::open_existing_in(&config.data_dir).context("업로드 원장 열기 실패")? {
        Some(ledger) => ledger,
        None => {
            println!("[!] 업로드된 문서가 없습니다.");
            return Ok(());
        }
    };
    let records = ledger.list(limit).context("원장 조회 실패")?;

    if records.is_empty() {
        println!("[!] 업로드된 문서가 없습니다.");
        return Ok(());
    }

    println!("[OK] 업로드된 문서 ({} 건):\n", records.len());

    for record in records {
        println!(
            "  {}  {}  {}",
            record.fingerprint.short(),
            record.inserted_at.format("%Y-%m-%d %H:%M:%S"),
            truncate_text(&record.filename, 60)
        );
    }

    Ok(())
}

/// 중복 확인 명령어 (check)
async fn cmd_check(
    config: &AppConfig,
    path: Option<PathBuf>,
    fingerprint_hex: Option<String>,
) -> Result<()> {
    let fp = match (fingerprint_hex, path) {
        (Some(hex), _) => Fingerprint::parse(&hex)?,
        (None, Some(path)) => fingerprint_file(&path).await?,
        (None, None) => bail!("경로 또는 --fingerprint를 지정해야 합니다"),
    };

    println!("[*] 지문: {}", fp);

    let ledger = match Ledger::open_existing_in(&config.data_dir).context("업로드 원장 열기 실패")? {
        Some(ledger) => ledger,
        None => {
            println!("[!] 아직 업로드되지 않았습니다. (원장 없음)");
            return Ok(());
        }
    };

    if is_duplicate(&ledger, &fp).context("원장 조회 실패")? {
        println!("[OK] 이미 업로드됨");
        if let Some(record) = ledger.get(&fp).context("원장 조회 실패")? {
            println!("     파일명: {}", record.filename);
            println!(
                "     시각: {}",
                record.inserted_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    } else {
        println!("[!] 아직 업로드되지 않았습니다.");
    }

    // 인덱스와 원장 대조
    if let Some(index) = open_existing_index(config).await {
        match index.count_for(&fp).await {
            Ok(n) => println!("[*] 인덱스 청크: {}", n),
            Err(e) => tracing::debug!("Vector count failed: {}", e),
        }
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &AppConfig) -> Result<()> {
    println!("lmd-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!(
        "[*] 청킹: {} 문자 / 오버랩 {}",
        config.chunk.window_size(),
        config.chunk.overlap()
    );

    match Ledger::open_existing_in(&config.data_dir)
        .and_then(|l| l.map(|l| l.stats()).transpose())
    {
        Ok(None) => println!("[*] 업로드 원장: 없음 (첫 ingest 시 생성)"),
        Ok(Some(stats)) => {
            println!("[OK] 업로드 원장: {} 건", stats.record_count);
            if let Some(last) = stats.last_inserted_at {
                println!("     마지막 업로드: {}", last.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
        Err(e) => println!("[!] 업로드 원장 열기 실패: {:#}", e),
    }

    if !config.data_dir.join(VECTOR_DIR_NAME).exists() {
        println!("[*] 벡터 인덱스: 없음");
    } else {
        match KnowledgeIndex::open(&config.data_dir, &config.ollama).await {
            Ok(index) => match index.count().await {
                Ok(n) => println!("[OK] 벡터 인덱스: {} 청크", n),
                Err(e) => println!("[!] 벡터 통계 조회 실패: {:#}", e),
            },
            Err(e) => println!("[!] 벡터 인덱스 열기 실패: {:#}", e),
        }
    }

    let chat = OllamaChat::new(&config.ollama)?;
    match chat.has_model().await {
        Ok(true) => println!("[OK] Ollama: {} ({})", config.ollama.host, config.ollama.chat_model),
        Ok(false) => {
            println!("[!] Ollama 연결됨, 모델 없음: {}", config.ollama.chat_model);
            println!("    설치: ollama pull {}", config.ollama.chat_model);
        }
        Err(e) => {
            println!("[!] Ollama 연결 실패: {}", config.ollama.host);
            tracing::debug!("Ollama check failed: {:#}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 이미 만들어진 벡터 인덱스만 열기
async fn open_existing_index(config: &AppConfig) -> Option<KnowledgeIndex> {
    if !config.data_dir.join(VECTOR_DIR_NAME).exists() {
        return None;
    }

    match KnowledgeIndex::open(&config.data_dir, &config.ollama).await {
        Ok(index) => Some(index),
        Err(e) => {
            tracing::debug!("Vector index unavailable: {}", e);
            None
        }
    }
}

/// 업로드 결과 한 줄
fn format_upload_line(summary: &UploadSummary<'_>) -> String {
    match summary.status {
        "INDEXED" => format!("[OK] {} 청크", summary.chunks.unwrap_or(0)),
        "DUPLICATE" => match summary.original_filename {
            Some(original) => format!("[SKIP] 이미 업로드됨 (원본: {})", original),
            None => "[SKIP] 이미 업로드됨".to_string(),
        },
        _ => format!(
            "[FAIL] {} ({}): {}",
            summary
                .failed_stage
                .map(|s| s.as_str())
                .unwrap_or("unknown"),
            summary.error_kind.unwrap_or("Error"),
            summary.error.as_deref().unwrap_or("")
        ),
    }
}

async fn fingerprint_file(path: &Path) -> Result<Fingerprint> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("파일 읽기 실패: {:?}", path))?;
    Ok(fingerprint(&bytes))
}

/// 답변 출력 (인용 제거 + 키워드 강조)
fn print_answer(answer: &RagAnswer, plain: bool) {
    let cleaned = clean_citations(&answer.answer);
    let display = if plain {
        cleaned
    } else {
        highlight_keywords_ansi(&cleaned)
    };

    println!();
    println!("{}", display);
    println!();

    if !answer.sources.is_empty() {
        println!("출처:");
        for source in &answer.sources {
            let page = source
                .page
                .map(|p| format!(" p.{}", p))
                .unwrap_or_default();
            println!(
                "  - {}{} [점수: {:.4}]",
                source.source_filename, page, source.score
            );
        }
        println!();
    }
}

fn print_history(history: &ConversationHistory) {
    if history.is_empty() {
        println!("[!] 아직 질문이 없습니다.");
        return;
    }

    for turn in history.recent(HISTORY_DISPLAY_LIMIT) {
        let rating = turn.feedback.map(|f| f.label()).unwrap_or("-");
        println!("  Q: {}", truncate_text(&turn.question, 80));
        println!("  A: {}", truncate_text(&turn.answer, 120));
        println!("     {} | {}", turn.asked_at.format("%H:%M:%S"), rating);
        println!();
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
