// crates/decision-link-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Token Store
// Description: Durable TokenStore backed by SQLite WAL.
// Purpose: Persist token lifecycles with single-winner consumption.
// Dependencies: decision-link-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! Tokens live in one `tokens` table. Every mutation runs in a
//! `BEGIN IMMEDIATE` transaction so writers from any connection are
//! serialized by `SQLite` itself:
//!
//! - `issue` revokes the current active row for the pair and inserts the new
//!   one in the same transaction.
//! - `try_consume` issues one conditional `UPDATE ... WHERE state = 'active'
//!   AND expires_at > now`. Only when it changes no row does a follow-up read
//!   classify the failure.
//!
//! A partial unique index on `(subject_id, action_kind) WHERE state =
//! 'active'` backs the one-active-token rule at the schema level. Rows are
//! never deleted. Busy and locked database errors surface as
//! [`StoreError::Unavailable`].
//!
//! Security posture: database contents are untrusted and every row is
//! re-validated on read; rows hold a digest of the bearer tag, never the
//! bearer itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use decision_link_core::ActionKind;
use decision_link_core::ConsumeError;
use decision_link_core::IssueReceipt;
use decision_link_core::StoreError;
use decision_link_core::SubjectId;
use decision_link_core::Timestamp;
use decision_link_core::TokenId;
use decision_link_core::TokenRecord;
use decision_link_core::TokenState;
use decision_link_core::TokenStore;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Column list shared by every token read.
const TOKEN_COLUMNS: &str = "token_id, subject_id, action_kind, issued_at, expires_at, state, \
                             consumed_at, revoked_at, payload_digest";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` token store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default tuning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Database busy or locked; the operation did not take effect.
    #[error("sqlite store busy: {0}")]
    Busy(String),
    /// Store corruption.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Write conflicted with an existing row.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message)
            | SqliteStoreError::Db(message)
            | SqliteStoreError::VersionMismatch(message) => Self::Store(message),
            SqliteStoreError::Busy(message) => Self::Unavailable(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
        }
    }
}

/// Maps an engine error, separating transient contention from hard failures.
fn db_error(err: &rusqlite::Error) -> SqliteStoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            SqliteStoreError::Busy(err.to_string())
        }
        Some(ErrorCode::ConstraintViolation) => SqliteStoreError::Conflict(err.to_string()),
        _ => SqliteStoreError::Db(err.to_string()),
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed token store with WAL support.
#[derive(Clone)]
pub struct SqliteTokenStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteTokenStore {
    /// Opens an `SQLite`-backed token store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Acquires the connection lock.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Busy("mutex poisoned".to_string()))
    }

    /// Inserts a new active token, revoking its predecessor.
    fn issue_token(&self, record: &TokenRecord) -> Result<IssueReceipt, SqliteStoreError> {
        record.validate_new().map_err(SqliteStoreError::Invalid)?;
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| db_error(&err))?;
        let exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM tokens WHERE token_id = ?1",
                params![record.token_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        if exists.is_some() {
            return Err(SqliteStoreError::Conflict("token id already issued".to_string()));
        }
        let revoked =
            revoke_active(&tx, &record.subject_id, record.action_kind, record.issued_at)?;
        tx.execute(
            "INSERT INTO tokens (token_id, subject_id, action_kind, issued_at, expires_at, \
             state, consumed_at, revoked_at, payload_digest) VALUES (?1, ?2, ?3, ?4, ?5, \
             'active', NULL, NULL, ?6)",
            params![
                record.token_id.as_str(),
                record.subject_id.as_str(),
                record.action_kind.as_str(),
                record.issued_at.as_unix_millis(),
                record.expires_at.as_unix_millis(),
                record.payload_digest,
            ],
        )
        .map_err(|err| db_error(&err))?;
        tx.commit().map_err(|err| db_error(&err))?;
        drop(guard);
        Ok(IssueReceipt {
            revoked,
        })
    }

    /// Runs the conditional consume and classifies a miss.
    fn consume_token(
        &self,
        token_id: &TokenId,
        now: Timestamp,
    ) -> Result<Result<TokenRecord, ConsumeError>, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| db_error(&err))?;
        let changed = tx
            .execute(
                "UPDATE tokens SET state = 'consumed', consumed_at = ?2 WHERE token_id = ?1 AND \
                 state = 'active' AND expires_at > ?2",
                params![token_id.as_str(), now.as_unix_millis()],
            )
            .map_err(|err| db_error(&err))?;
        let row = select_by_id(&tx, token_id)?;
        tx.commit().map_err(|err| db_error(&err))?;
        drop(guard);

        let Some(record) = row else {
            return Ok(Err(ConsumeError::NotFound));
        };
        if changed == 1 {
            return Ok(Ok(record));
        }
        let outcome = match record.state {
            TokenState::Consumed => ConsumeError::AlreadyConsumed {
                consumed_at: record.consumed_at,
            },
            TokenState::Revoked => ConsumeError::Revoked {
                revoked_at: record.revoked_at,
            },
            TokenState::Active | TokenState::Expired => ConsumeError::Expired {
                expires_at: record.expires_at,
            },
        };
        Ok(Err(outcome))
    }
}

impl TokenStore for SqliteTokenStore {
    fn issue(&self, record: &TokenRecord) -> Result<IssueReceipt, StoreError> {
        self.issue_token(record).map_err(StoreError::from)
    }

    fn try_consume(
        &self,
        token_id: &TokenId,
        now: Timestamp,
    ) -> Result<TokenRecord, ConsumeError> {
        self.consume_token(token_id, now).map_err(StoreError::from)?
    }

    fn revoke(
        &self,
        subject_id: &SubjectId,
        action_kind: ActionKind,
        now: Timestamp,
    ) -> Result<Option<TokenId>, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| db_error(&err))?;
        let revoked = revoke_active(&tx, subject_id, action_kind, now)?;
        tx.commit().map_err(|err| db_error(&err))?;
        drop(guard);
        Ok(revoked)
    }

    fn load(&self, token_id: &TokenId) -> Result<Option<TokenRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(select_by_id(&guard, token_id)?)
    }

    fn active_for(
        &self,
        subject_id: &SubjectId,
        action_kind: ActionKind,
    ) -> Result<Option<TokenRecord>, StoreError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                &format!(
                    "SELECT {TOKEN_COLUMNS} FROM tokens WHERE subject_id = ?1 AND action_kind = \
                     ?2 AND state = 'active'"
                ),
                params![subject_id.as_str(), action_kind.as_str()],
                StoredRow::from_row,
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        drop(guard);
        Ok(row.map(StoredRow::into_record).transpose()?)
    }
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Raw column values for one token row.
struct StoredRow {
    /// `token_id` column.
    token_id: String,
    /// `subject_id` column.
    subject_id: String,
    /// `action_kind` column.
    action_kind: String,
    /// `issued_at` column.
    issued_at: i64,
    /// `expires_at` column.
    expires_at: i64,
    /// `state` column.
    state: String,
    /// `consumed_at` column.
    consumed_at: Option<i64>,
    /// `revoked_at` column.
    revoked_at: Option<i64>,
    /// `payload_digest` column.
    payload_digest: String,
}

impl StoredRow {
    /// Reads columns in [`TOKEN_COLUMNS`] order.
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            token_id: row.get(0)?,
            subject_id: row.get(1)?,
            action_kind: row.get(2)?,
            issued_at: row.get(3)?,
            expires_at: row.get(4)?,
            state: row.get(5)?,
            consumed_at: row.get(6)?,
            revoked_at: row.get(7)?,
            payload_digest: row.get(8)?,
        })
    }

    /// Validates the row and converts it into a core record.
    fn into_record(self) -> Result<TokenRecord, SqliteStoreError> {
        let corrupt = |what: &str| SqliteStoreError::Corrupt(format!("invalid {what} in token row"));
        let state = TokenState::from_str(&self.state).map_err(|_| corrupt("state"))?;
        let consistent = match state {
            TokenState::Active => self.consumed_at.is_none() && self.revoked_at.is_none(),
            TokenState::Consumed => self.consumed_at.is_some() && self.revoked_at.is_none(),
            TokenState::Revoked => self.consumed_at.is_none() && self.revoked_at.is_some(),
            TokenState::Expired => false,
        };
        if !consistent {
            return Err(corrupt("lifecycle timestamps"));
        }
        if self.expires_at <= self.issued_at {
            return Err(corrupt("validity window"));
        }
        Ok(TokenRecord {
            token_id: TokenId::parse(&self.token_id).map_err(|_| corrupt("token_id"))?,
            subject_id: SubjectId::new(self.subject_id).map_err(|_| corrupt("subject_id"))?,
            action_kind: ActionKind::from_str(&self.action_kind)
                .map_err(|_| corrupt("action_kind"))?,
            issued_at: Timestamp::from_unix_millis(self.issued_at),
            expires_at: Timestamp::from_unix_millis(self.expires_at),
            state,
            consumed_at: self.consumed_at.map(Timestamp::from_unix_millis),
            revoked_at: self.revoked_at.map(Timestamp::from_unix_millis),
            payload_digest: self.payload_digest,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads one token row by id.
fn select_by_id(
    connection: &Connection,
    token_id: &TokenId,
) -> Result<Option<TokenRecord>, SqliteStoreError> {
    connection
        .query_row(
            &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_id = ?1"),
            params![token_id.as_str()],
            StoredRow::from_row,
        )
        .optional()
        .map_err(|err| db_error(&err))?
        .map(StoredRow::into_record)
        .transpose()
}

/// Revokes the active row for a pair inside an open transaction.
fn revoke_active(
    tx: &rusqlite::Transaction<'_>,
    subject_id: &SubjectId,
    action_kind: ActionKind,
    now: Timestamp,
) -> Result<Option<TokenId>, SqliteStoreError> {
    let active: Option<String> = tx
        .query_row(
            "SELECT token_id FROM tokens WHERE subject_id = ?1 AND action_kind = ?2 AND state = \
             'active'",
            params![subject_id.as_str(), action_kind.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| db_error(&err))?;
    let Some(active) = active else {
        return Ok(None);
    };
    tx.execute(
        "UPDATE tokens SET state = 'revoked', revoked_at = ?2 WHERE token_id = ?1 AND state = \
         'active'",
        params![active, now.as_unix_millis()],
    )
    .map_err(|err| db_error(&err))?;
    TokenId::parse(&active)
        .map(Some)
        .map_err(|_| SqliteStoreError::Corrupt("invalid token_id in token row".to_string()))
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    Ok(connection)
}

/// Initializes the `SQLite` schema or validates existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|err| db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_error(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS tokens (
                    token_id TEXT PRIMARY KEY,
                    subject_id TEXT NOT NULL,
                    action_kind TEXT NOT NULL,
                    issued_at INTEGER NOT NULL,
                    expires_at INTEGER NOT NULL,
                    state TEXT NOT NULL CHECK (state IN ('active', 'consumed', 'revoked')),
                    consumed_at INTEGER,
                    revoked_at INTEGER,
                    payload_digest TEXT NOT NULL,
                    CHECK (expires_at > issued_at)
                );
                CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_one_active
                    ON tokens (subject_id, action_kind) WHERE state = 'active';",
            )
            .map_err(|err| db_error(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_error(&err))?;
    Ok(())
}
