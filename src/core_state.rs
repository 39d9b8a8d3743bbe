//! Shared application state.
//!
//! One `CoreState` lives behind an `Arc` for the lifetime of the server.
//! Every handler opens its own SQLite connection through `open_db`; the
//! in-memory pieces (sessions, audit buffer, event bus) sit behind locks
//! that are never held across an `.await`.

use std::path::PathBuf;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::accounts::SessionRegistry;
use crate::config::AppConfig;
use crate::db;
use crate::tracker::EventBus;

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

/// Audit rows older than this are pruned on flush.
const AUDIT_RETENTION_DAYS: i64 = 90;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    /// Bearer sessions. Write lock only on login, logout and revocation.
    sessions: RwLock<SessionRegistry>,
    /// Enquiry status feed for tracker subscribers.
    pub events: EventBus,
    /// Request audit trail, buffered and flushed to `audit_log`.
    audit: AuditLogger,
}

impl CoreState {
    pub fn new(config: AppConfig) -> Self {
        let sessions = SessionRegistry::new(config.session_ttl);
        Self {
            config,
            sessions: RwLock::new(sessions),
            events: EventBus::new(),
            audit: AuditLogger::new(),
        }
    }

    /// Create the data and upload directories and bring the schema up to date.
    pub fn init_storage(&self) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.config.data_dir)?;
        std::fs::create_dir_all(self.config.upload_dir())?;
        db::open_database(&self.config.db_path())?;
        tracing::info!(path = %self.config.db_path().display(), "Database ready");
        Ok(())
    }

    /// Open a connection to the shared database. Schema is assumed current.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        Ok(db::open_connection(&self.config.db_path())?)
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.config.upload_dir()
    }

    // ── Sessions ────────────────────────────────────────────

    pub fn read_sessions(&self) -> Result<RwLockReadGuard<'_, SessionRegistry>, CoreError> {
        self.sessions.read().map_err(|_| CoreError::LockPoisoned)
    }

    pub fn write_sessions(&self) -> Result<RwLockWriteGuard<'_, SessionRegistry>, CoreError> {
        self.sessions.write().map_err(|_| CoreError::LockPoisoned)
    }

    // ── Audit logging ───────────────────────────────────────

    /// Record one request. Auto-flushes to DB when the buffer is full.
    pub fn log_access(&self, actor: &str, action: &str, outcome: &str) {
        let needs_flush = self.audit.log(actor, action, outcome);
        if needs_flush {
            if let Err(e) = self.flush_and_prune_audit() {
                tracing::warn!("Auto-flush audit failed: {e}");
            }
        }
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    /// Flush the audit buffer to DB and prune old rows.
    pub fn flush_and_prune_audit(&self) -> Result<usize, CoreError> {
        let conn = self.open_db()?;
        let flushed = self.audit.flush_to_db(&conn)?;
        if let Err(e) = db::repository::prune_audit_log(&conn, AUDIT_RETENTION_DAYS) {
            tracing::warn!("Failed to prune audit log: {e}");
        }
        Ok(flushed)
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEntry>>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// `user:<id>` or `anonymous`.
    pub actor: String,
    pub action: String,
    pub outcome: String,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Buffer one entry. Returns `true` once the flush threshold is reached.
    pub fn log(&self, actor: &str, action: &str, outcome: &str) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(AuditEntry {
                timestamp: chrono::Utc::now(),
                actor: actor.to_string(),
                action: action.to_string(),
                outcome: outcome.to_string(),
            });
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    pub fn flush_to_db(&self, conn: &rusqlite::Connection) -> Result<usize, CoreError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }

        let tuples: Vec<(String, String, String, String)> = entries
            .into_iter()
            .map(|e| (db::timestamp_to_sql(&e.timestamp), e.actor, e.action, e.outcome))
            .collect();

        let count = tuples.len();
        db::repository::insert_audit_entries(conn, &tuples)?;

        tracing::debug!(count, "Flushed audit entries to database");
        Ok(count)
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::Role;
    use crate::workflow::Actor;

    fn temp_state() -> (tempfile::TempDir, CoreState) {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::new(AppConfig::with_data_dir(dir.path()));
        state.init_storage().unwrap();
        (dir, state)
    }

    #[test]
    fn init_storage_creates_layout() {
        let (_dir, state) = temp_state();
        assert!(state.config.db_path().exists());
        assert!(state.upload_dir().is_dir());
        let conn = state.open_db().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM enquiries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn sessions_issue_and_validate_through_state() {
        let (_dir, state) = temp_state();
        let actor = Actor { user_id: uuid::Uuid::new_v4(), role: Role::Support, district_id: None };
        let token = state.write_sessions().unwrap().issue(actor.clone());
        assert_eq!(state.read_sessions().unwrap().validate(&token), Some(actor));
    }

    #[test]
    fn audit_logger_signals_flush_at_capacity() {
        let logger = AuditLogger::new();
        for _ in 0..AUDIT_BUFFER_CAPACITY - 1 {
            assert!(!logger.log("anonymous", "GET /api/health", "status:200"));
        }
        assert!(logger.log("anonymous", "GET /api/health", "status:200"));
        assert_eq!(logger.drain().len(), AUDIT_BUFFER_CAPACITY);
        assert_eq!(logger.buffer_len(), 0);
    }

    #[test]
    fn audit_flush_persists_entries() {
        let conn = open_memory_database().unwrap();
        let logger = AuditLogger::new();
        logger.log("user:abc", "PATCH /api/enquiries/1/forward", "status:200");
        logger.log("anonymous", "GET /api/enquiries", "status:401");

        assert_eq!(logger.flush_to_db(&conn).unwrap(), 2);
        assert_eq!(logger.flush_to_db(&conn).unwrap(), 0);

        let outcome: String = conn
            .query_row("SELECT outcome FROM audit_log WHERE actor = 'anonymous'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(outcome, "status:401");
    }

    #[test]
    fn state_flush_writes_to_database() {
        let (_dir, state) = temp_state();
        state.log_access("user:abc", "GET /api/ambulances", "status:200");
        assert_eq!(state.audit_entries().len(), 1);
        assert_eq!(state.flush_and_prune_audit().unwrap(), 1);
        assert!(state.audit_entries().is_empty());
    }

    #[test]
    fn core_error_display() {
        assert_eq!(CoreError::LockPoisoned.to_string(), "Internal lock error");
    }
}
