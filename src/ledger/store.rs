//! Ingestion Ledger - rusqlite 기반 업로드 원장
//!
//! 어떤 지문(fingerprint)이 이미 인덱싱되었는지 기록하는 단일 테이블입니다.
//! 파일 내용은 저장하지 않고 지문과 메타데이터만 저장합니다.
//! 저장 위치: <data_dir>/upload_hashes.db

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;

use super::hasher::Fingerprint;

/// 원장 파일 이름
pub const LEDGER_FILE_NAME: &str = "upload_hashes.db";

/// 원장 테이블 이름
const TABLE_NAME: &str = "file_hashes";

/// 다른 프로세스가 쓰기 잠금을 잡고 있을 때 대기 시간
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

/// 원장 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub fingerprint: Fingerprint,
    pub filename: String,
    pub inserted_at: DateTime<Utc>,
}

/// 원장 통계
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStats {
    pub record_count: usize,
    pub last_inserted_at: Option<DateTime<Utc>>,
    pub db_path: PathBuf,
}

// ============================================================================
// Ledger
// ============================================================================

/// Ingestion Ledger
///
/// 프로세스당 한 번 열어서 명시적으로 전달하는 핸들입니다.
/// drop 또는 [`Ledger::close`] 시 연결이 해제됩니다.
pub struct Ledger {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Ledger {
    /// 원장 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create ledger directory")?;
            }
        }

        Self::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    /// 이미 있는 원장만 열기 (조회 전용 명령용)
    ///
    /// 파일이 없으면 아무것도 만들지 않고 `None`을 반환합니다.
    pub fn open_existing(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }

        Self::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map(Some)
    }

    /// 데이터 디렉토리 안의 기본 위치에서 열기
    pub fn open_in(data_dir: &Path) -> Result<Self> {
        Self::open(&data_dir.join(LEDGER_FILE_NAME))
    }

    /// 데이터 디렉토리 안의 기존 원장 열기
    pub fn open_existing_in(data_dir: &Path) -> Result<Option<Self>> {
        Self::open_existing(&data_dir.join(LEDGER_FILE_NAME))
    }

    fn open_with_flags(path: &Path, flags: OpenFlags) -> Result<Self> {
        let conn = Connection::open_with_flags(path, flags)
            .context("Failed to open ledger database")?;

        let ledger = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };

        ledger.initialize()?;
        Ok(ledger)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set busy timeout")?;

        // 여러 프로세스가 같은 파일을 공유할 수 있도록 WAL 사용
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .context("Failed to enable WAL journal")?;
        tracing::debug!("Ledger journal mode: {}", mode);

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
                    fingerprint TEXT PRIMARY KEY,
                    filename TEXT NOT NULL,
                    inserted_at TIMESTAMP NOT NULL
                )"
            ),
            [],
        )
        .context("Failed to create ledger table")?;

        tracing::debug!("Ingestion ledger initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 지문 존재 여부
    pub fn exists(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let conn = self.lock()?;

        let found = conn
            .query_row(
                &format!("SELECT 1 FROM {TABLE_NAME} WHERE fingerprint = ?1"),
                params![fingerprint.as_str()],
                |_| Ok(()),
            )
            .optional()
            .context("Failed to query ledger")?;

        Ok(found.is_some())
    }

    /// 레코드 추가
    ///
    /// 이미 존재하는 지문이면 아무것도 하지 않고 `false`를 반환합니다
    /// (동시에 진행된 다른 업로드가 먼저 기록한 경우 포함).
    pub fn insert(
        &self,
        fingerprint: &Fingerprint,
        filename: &str,
        inserted_at: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.lock()?;

        let rows = conn
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO {TABLE_NAME} (fingerprint, filename, inserted_at)
                     VALUES (?1, ?2, ?3)"
                ),
                params![
                    fingerprint.as_str(),
                    filename,
                    inserted_at.to_rfc3339_opts(SecondsFormat::Micros, true)
                ],
            )
            .context("Failed to insert ledger record")?;

        if rows == 0 {
            tracing::debug!("Ledger already has {} (insert ignored)", fingerprint.short());
        }

        Ok(rows > 0)
    }

    /// 지문으로 레코드 조회
    pub fn get(&self, fingerprint: &Fingerprint) -> Result<Option<FileRecord>> {
        let conn = self.lock()?;

        let record = conn
            .query_row(
                &format!(
                    "SELECT fingerprint, filename, inserted_at FROM {TABLE_NAME}
                     WHERE fingerprint = ?1"
                ),
                params![fingerprint.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query ledger")?;

        record.map(into_record).transpose()
    }

    /// 최근 레코드 목록 (최신순)
    pub fn list(&self, limit: usize) -> Result<Vec<FileRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT fingerprint, filename, inserted_at FROM {TABLE_NAME}
             ORDER BY inserted_at DESC
             LIMIT ?1"
        ))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list ledger records")?;

        rows.into_iter().map(into_record).collect()
    }

    /// 원장 통계
    pub fn stats(&self) -> Result<LedgerStats> {
        let conn = self.lock()?;

        let (count, last): (i64, Option<String>) = conn
            .query_row(
                &format!("SELECT COUNT(*), MAX(inserted_at) FROM {TABLE_NAME}"),
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .context("Failed to read ledger stats")?;

        Ok(LedgerStats {
            record_count: count as usize,
            last_inserted_at: last.as_deref().map(parse_datetime).transpose()?,
            db_path: self.db_path.clone(),
        })
    }

    /// 연결 명시적으로 닫기
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.close()
            .map_err(|(_, e)| e)
            .context("Failed to close ledger database")
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn into_record((fingerprint, filename, inserted_at): (String, String, String)) -> Result<FileRecord> {
    Ok(FileRecord {
        fingerprint: Fingerprint::parse(&fingerprint)
            .context("Corrupt fingerprint in ledger")?,
        filename,
        inserted_at: parse_datetime(&inserted_at)?,
    })
}

/// RFC3339 문자열을 DateTime<Utc>로 파싱
///
/// 원장이 기준 데이터이므로 손상된 값은 에러로 보고합니다.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Corrupt timestamp in ledger: {:?}", s))
}

// ============================================================================
// Tests
// ============================================================================
