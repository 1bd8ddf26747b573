//! Submitted-session record stores.
//!
//! DESIGN
//! ======
//! A record marks a session as submitted. Records are write-once: marking an
//! already-marked session is a no-op, and nothing ever clears a mark. Three
//! backends implement [`RecordStore`]:
//!
//! - [`MemoryStore`]: process-local, used by tests and ephemeral runs.
//! - [`JsonFileStore`]: a single JSON document rewritten through a temp file
//!   and rename, so a crash mid-write leaves the previous document intact.
//! - [`PgStore`]: the `submitted_sessions` table with an idempotent insert.
//!
//! Each backend serializes its own writes; callers may share one store
//! across tasks.

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record file io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("record file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl super::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "E_DATABASE",
            Self::Io(_) => "E_RECORD_IO",
            Self::Corrupt(_) => "E_RECORD_CORRUPT",
        }
    }

    fn retryable(&self) -> bool {
        !matches!(self, Self::Corrupt(_))
    }
}

/// Persistent "already submitted" marks keyed by session id.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Whether `session_id` has been marked submitted.
    async fn has(&self, session_id: &str) -> Result<bool, StoreError>;

    /// Mark `session_id` submitted. Marking twice is not an error.
    async fn mark_submitted(&self, session_id: &str) -> Result<(), StoreError>;
}

// =============================================================================
// MEMORY
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashSet<String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn has(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.read().await.contains(session_id))
    }

    async fn mark_submitted(&self, session_id: &str) -> Result<(), StoreError> {
        self.sessions.write().await.insert(session_id.to_string());
        Ok(())
    }
}

// =============================================================================
// JSON FILE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub submitted: bool,
    /// Milliseconds since the Unix epoch.
    pub submitted_at: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordFile {
    #[serde(default)]
    sessions: BTreeMap<String, SubmissionRecord>,
}

/// File-backed store. The lock covers read-modify-write of the whole file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<RecordFile, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(RecordFile::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RecordFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, file: &RecordFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(file)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for JsonFileStore {
    async fn has(&self, session_id: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let file = self.load().await?;
        Ok(file.sessions.get(session_id).is_some_and(|r| r.submitted))
    }

    async fn mark_submitted(&self, session_id: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        if file.sessions.get(session_id).is_some_and(|r| r.submitted) {
            debug!(%session_id, "record already present");
            return Ok(());
        }
        file.sessions
            .insert(session_id.to_string(), SubmissionRecord { submitted: true, submitted_at: now_ms() });
        self.save(&file).await?;
        info!(%session_id, path = %self.path.display(), "submission recorded");
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

// =============================================================================
// POSTGRES
// =============================================================================

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RecordStore for PgStore {
    async fn has(&self, session_id: &str) -> Result<bool, StoreError> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM submitted_sessions WHERE session_id = $1)")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    async fn mark_submitted(&self, session_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("INSERT INTO submitted_sessions (session_id) VALUES ($1) ON CONFLICT (session_id) DO NOTHING")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            debug!(%session_id, "record already present");
        } else {
            info!(%session_id, "submission recorded");
        }
        Ok(())
    }
}
