// crates/stoneforge-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Store
// Description: Durable Store/Transaction implementation backed by SQLite WAL.
// Purpose: Persist elements, dependencies, events, and the blocked cache
// across restarts, per spec.md §4.1 and §6 "Persisted state layout".
// Dependencies: stoneforge-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Each addressable row (element, dependency, event, blocked-cache entry) is
//! stored as a canonical JSON blob in a `data` column, alongside a handful of
//! plain columns the required indexes (spec.md §4.1) are built over. Readers
//! decode the blob rather than reconstructing rows from columns, matching
//! the rest of the core: the wire/storage shape is JSON, the in-process shape
//! is typed. A single mutex-guarded connection serializes every transaction
//! (spec.md §5): a begun transaction holds the connection for its lifetime,
//! so there is no separate writer thread or read-connection pool to keep in
//! sync with the write lane.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use stoneforge_core::error::CoreError;
use stoneforge_core::error::CoreResult;
use stoneforge_core::interfaces::ElementFilter;
use stoneforge_core::interfaces::OrderBy;
use stoneforge_core::interfaces::Store;
use stoneforge_core::interfaces::StoreStats;
use stoneforge_core::interfaces::Transaction;
use stoneforge_core::model::BlockedCacheRow;
use stoneforge_core::model::Dependency;
use stoneforge_core::model::DependencyKind;
use stoneforge_core::model::Element;
use stoneforge_core::model::ElementId;
use stoneforge_core::model::ElementKind;
use stoneforge_core::model::ElementPayload;
use stoneforge_core::model::Event;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Schema DDL applied once, on first open of a fresh database file.
const SCHEMA_DDL: &str = "
CREATE TABLE IF NOT EXISTS elements (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    deleted_at INTEGER,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_elements_kind ON elements (kind);
CREATE INDEX IF NOT EXISTS idx_elements_deleted_at ON elements (deleted_at);

CREATE TABLE IF NOT EXISTS dependencies (
    blocked_id TEXT NOT NULL,
    blocker_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    data TEXT NOT NULL,
    PRIMARY KEY (blocked_id, blocker_id, kind)
);
CREATE INDEX IF NOT EXISTS idx_dependencies_blocked ON dependencies (blocked_id, kind);
CREATE INDEX IF NOT EXISTS idx_dependencies_blocker ON dependencies (blocker_id, kind);

CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    element_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_element_timestamp ON events (element_id, timestamp);

CREATE TABLE IF NOT EXISTS blocked_cache (
    element_id TEXT PRIMARY KEY,
    blocked_by TEXT NOT NULL,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_blocked_cache_blocked_by ON blocked_cache (blocked_by);
";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
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
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
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

/// Configuration for the `SQLite`-backed store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    pub sync_mode: SqliteSyncMode,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stoneforge.db"),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors, converted into [`CoreError::Storage`] at the
/// `Store`/`Transaction` boundary.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Filesystem error opening or creating the database file.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// A stored row's JSON blob failed to decode, or a value could not be
    /// encoded for storage.
    #[error("sqlite store encoding error: {0}")]
    Encoding(String),
    /// The database file was created by an incompatible schema version.
    #[error("sqlite store schema version mismatch: {0}")]
    VersionMismatch(String),
}

impl From<SqliteStoreError> for CoreError {
    fn from(error: SqliteStoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

impl From<serde_json::Error> for SqliteStoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::Encoding(error.to_string())
    }
}

/// Maps a `rusqlite` error into the crate's `CoreResult` error type.
fn db_err(error: rusqlite::Error) -> CoreError {
    CoreError::from(SqliteStoreError::from(error))
}

/// Maps a `serde_json` error into the crate's `CoreResult` error type.
fn json_err(error: serde_json::Error) -> CoreError {
    CoreError::from(SqliteStoreError::from(error))
}

/// Serializes a unit-like enum (`#[serde(rename_all = "snake_case")]`) to its
/// bare snake_case string, for use as an indexed `TEXT` column value.
fn enum_text<T: Serialize>(value: &T) -> CoreResult<String> {
    let json = serde_json::to_value(value).map_err(json_err)?;
    json.as_str()
        .map(str::to_owned)
        .ok_or_else(|| CoreError::Storage("expected a string-serializable enum".to_string()))
}

/// Inverse of [`enum_text`].
fn enum_from_text<T: DeserializeOwned>(text: &str) -> CoreResult<T> {
    serde_json::from_value(serde_json::Value::String(text.to_string())).map_err(json_err)
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Opens the database file, applies pragmas, and ensures the schema exists.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    if let Some(parent) = config.path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    }
    let flags =
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let mut connection = Connection::open_with_flags(&config.path, flags)?;
    apply_pragmas(&connection, config)?;
    initialize_schema(&mut connection)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;
    connection.execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
    connection.execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    connection.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
    Ok(())
}

/// Creates the schema on first open, or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> =
        tx.query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0)).optional()?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
            tx.execute_batch(SCHEMA_DDL)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "database schema version {value} is incompatible with supported version {SCHEMA_VERSION}"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed [`Store`] with WAL support.
///
/// Every transaction holds the single connection for its lifetime (spec.md
/// §5 "writers serialize on a single lane"); a backend with a richer
/// concurrency story could add a read-connection pool, but nothing in the
/// `Transaction` seam requires one.
pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if absent) a `SQLite`-backed store at `config.path`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the file cannot be opened or
    /// created, or if it was written by an incompatible schema version.
    pub fn open(config: &SqliteStoreConfig) -> CoreResult<Self> {
        let connection = open_connection(config).map_err(CoreError::from)?;
        Ok(Self { connection: Mutex::new(connection) })
    }

    /// Opens an in-memory `SQLite` database, for tests that want the real
    /// backend without a file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] on connection failure.
    pub fn open_in_memory() -> CoreResult<Self> {
        let mut connection = Connection::open_in_memory().map_err(|err| CoreError::from(SqliteStoreError::from(err)))?;
        let config = SqliteStoreConfig::default();
        apply_pragmas(&connection, &config).map_err(CoreError::from)?;
        initialize_schema(&mut connection).map_err(CoreError::from)?;
        Ok(Self { connection: Mutex::new(connection) })
    }
}

impl Store for SqliteStore {
    type Tx<'a> = SqliteTransaction<'a>;

    fn begin(&self) -> CoreResult<Self::Tx<'_>> {
        let guard =
            self.connection.lock().map_err(|_| CoreError::Storage("sqlite store mutex poisoned".to_string()))?;
        guard.execute_batch("BEGIN IMMEDIATE").map_err(db_err)?;
        Ok(SqliteTransaction { guard, done: false })
    }
}

// ============================================================================
// SECTION: Transaction
// ============================================================================

/// A transaction over a [`SqliteStore`]; holds the connection mutex for its
/// lifetime, so `begin()` blocks a concurrent caller until this transaction
/// commits or rolls back.
pub struct SqliteTransaction<'a> {
    guard: MutexGuard<'a, Connection>,
    done: bool,
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.guard.execute_batch("ROLLBACK");
        }
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn insert_element(&mut self, element: &Element) -> CoreResult<()> {
        let data = serde_json::to_string(element).map_err(json_err)?;
        let kind = enum_text(&element.kind())?;
        let result = self.guard.execute(
            "INSERT INTO elements (id, kind, created_at, updated_at, deleted_at, data) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                element.id.as_str(),
                kind,
                element.created_at.as_unix_millis(),
                element.updated_at.as_unix_millis(),
                element.deleted_at.map(stoneforge_core::model::Timestamp::as_unix_millis),
                data,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                Err(CoreError::AlreadyExists(element.id.to_string()))
            }
            Err(err) => Err(db_err(err)),
        }
    }

    fn get_element(&mut self, id: &ElementId) -> CoreResult<Option<Element>> {
        let data: Option<String> = self
            .guard
            .query_row("SELECT data FROM elements WHERE id = ?1", params![id.as_str()], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        data.map(|json| serde_json::from_str(&json).map_err(json_err)).transpose()
    }

    fn replace_element(&mut self, element: &Element) -> CoreResult<()> {
        let data = serde_json::to_string(element).map_err(json_err)?;
        let kind = enum_text(&element.kind())?;
        let changed = self
            .guard
            .execute(
                "UPDATE elements SET kind = ?2, created_at = ?3, updated_at = ?4, deleted_at = ?5, data = ?6 \
                 WHERE id = ?1",
                params![
                    element.id.as_str(),
                    kind,
                    element.created_at.as_unix_millis(),
                    element.updated_at.as_unix_millis(),
                    element.deleted_at.map(stoneforge_core::model::Timestamp::as_unix_millis),
                    data,
                ],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(CoreError::NotFound(element.id.clone()));
        }
        Ok(())
    }

    fn list_elements(&mut self, filter: &ElementFilter) -> CoreResult<Vec<Element>> {
        let mut sql = String::from("SELECT data FROM elements WHERE 1 = 1");
        if !filter.include_deleted {
            sql.push_str(" AND deleted_at IS NULL");
        }
        if filter.kind.is_some() {
            sql.push_str(" AND kind = ?1");
        }
        sql.push_str(match filter.order_by {
            OrderBy::CreatedAtAsc => " ORDER BY created_at ASC, id ASC",
            OrderBy::CreatedAtDesc => " ORDER BY created_at DESC, id ASC",
            OrderBy::UpdatedAtAsc => " ORDER BY updated_at ASC, id ASC",
            OrderBy::UpdatedAtDesc => " ORDER BY updated_at DESC, id ASC",
        });

        let mut stmt = self.guard.prepare(&sql).map_err(db_err)?;
        let rows: Vec<String> = match filter.kind {
            Some(kind) => {
                let kind_text = enum_text(&kind)?;
                stmt.query_map(params![kind_text], |row| row.get(0))
                    .map_err(db_err)?
                    .collect::<Result<_, _>>()
                    .map_err(db_err)?
            }
            None => {
                stmt.query_map(params![], |row| row.get(0)).map_err(db_err)?.collect::<Result<_, _>>().map_err(db_err)?
            }
        };
        drop(stmt);

        let mut elements = Vec::with_capacity(rows.len());
        for json in rows {
            let element: Element = serde_json::from_str(&json).map_err(json_err)?;
            if filter.tags.iter().all(|tag| element.tags.contains(tag)) {
                elements.push(element);
            }
        }
        Ok(elements.into_iter().skip(filter.offset).take(filter.limit).collect())
    }

    fn search_elements(&mut self, query: &str, kind: Option<ElementKind>) -> CoreResult<Vec<Element>> {
        let needle = query.to_lowercase();
        let mut sql = String::from("SELECT data FROM elements WHERE deleted_at IS NULL");
        if kind.is_some() {
            sql.push_str(" AND kind = ?1");
        }
        let mut stmt = self.guard.prepare(&sql).map_err(db_err)?;
        let rows: Vec<String> = match kind {
            Some(kind) => {
                let kind_text = enum_text(&kind)?;
                stmt.query_map(params![kind_text], |row| row.get(0))
                    .map_err(db_err)?
                    .collect::<Result<_, _>>()
                    .map_err(db_err)?
            }
            None => {
                stmt.query_map(params![], |row| row.get(0)).map_err(db_err)?.collect::<Result<_, _>>().map_err(db_err)?
            }
        };
        drop(stmt);

        let mut matches = Vec::new();
        for json in rows {
            let element: Element = serde_json::from_str(&json).map_err(json_err)?;
            if element_matches_query(&element, &needle) {
                matches.push(element);
            }
        }
        Ok(matches)
    }

    fn stats(&mut self) -> CoreResult<StoreStats> {
        let mut stats = StoreStats::default();
        for kind in ElementKind::all() {
            let kind_text = enum_text(&kind)?;
            let count: i64 = self
                .guard
                .query_row(
                    "SELECT COUNT(*) FROM elements WHERE deleted_at IS NULL AND kind = ?1",
                    params![kind_text],
                    |row| row.get(0),
                )
                .map_err(db_err)?;
            stats.elements_by_type.push((kind, u64::try_from(count).unwrap_or(0)));
        }

        let task_kind = enum_text(&ElementKind::Task)?;
        let mut stmt = self
            .guard
            .prepare("SELECT data FROM elements WHERE deleted_at IS NULL AND kind = ?1")
            .map_err(db_err)?;
        let rows: Vec<String> =
            stmt.query_map(params![task_kind], |row| row.get(0)).map_err(db_err)?.collect::<Result<_, _>>().map_err(db_err)?;
        drop(stmt);
        for json in rows {
            let element: Element = serde_json::from_str(&json).map_err(json_err)?;
            if let Some(task) = element.payload.as_task() {
                bump(&mut stats.tasks_by_status, task.status);
                bump(&mut stats.tasks_by_priority, task.priority);
            }
        }

        let dependency_count: i64 =
            self.guard.query_row("SELECT COUNT(*) FROM dependencies", params![], |row| row.get(0)).map_err(db_err)?;
        stats.dependency_count = u64::try_from(dependency_count).unwrap_or(0);
        let blocked_count: i64 =
            self.guard.query_row("SELECT COUNT(*) FROM blocked_cache", params![], |row| row.get(0)).map_err(db_err)?;
        stats.blocked_count = u64::try_from(blocked_count).unwrap_or(0);
        Ok(stats)
    }

    fn insert_dependency(&mut self, dependency: &Dependency) -> CoreResult<()> {
        let data = serde_json::to_string(dependency).map_err(json_err)?;
        let kind = enum_text(&dependency.kind)?;
        let result = self.guard.execute(
            "INSERT INTO dependencies (blocked_id, blocker_id, kind, data) VALUES (?1, ?2, ?3, ?4)",
            params![dependency.blocked_id.as_str(), dependency.blocker_id.as_str(), kind, data],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                Err(CoreError::AlreadyExists(format!(
                    "{} -{:?}-> {}",
                    dependency.blocked_id, dependency.kind, dependency.blocker_id
                )))
            }
            Err(err) => Err(db_err(err)),
        }
    }

    fn remove_dependency(
        &mut self,
        blocked_id: &ElementId,
        blocker_id: &ElementId,
        kind: DependencyKind,
    ) -> CoreResult<bool> {
        let kind_text = enum_text(&kind)?;
        let changed = self
            .guard
            .execute(
                "DELETE FROM dependencies WHERE blocked_id = ?1 AND blocker_id = ?2 AND kind = ?3",
                params![blocked_id.as_str(), blocker_id.as_str(), kind_text],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    fn update_dependency(&mut self, dependency: &Dependency) -> CoreResult<()> {
        let data = serde_json::to_string(dependency).map_err(json_err)?;
        let kind = enum_text(&dependency.kind)?;
        let changed = self
            .guard
            .execute(
                "UPDATE dependencies SET data = ?4 WHERE blocked_id = ?1 AND blocker_id = ?2 AND kind = ?3",
                params![dependency.blocked_id.as_str(), dependency.blocker_id.as_str(), kind, data],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(CoreError::NotFound(dependency.blocked_id.clone()));
        }
        Ok(())
    }

    fn get_dependencies(&mut self, id: &ElementId, kinds: Option<&[DependencyKind]>) -> CoreResult<Vec<Dependency>> {
        let mut stmt = self.guard.prepare("SELECT data FROM dependencies WHERE blocked_id = ?1").map_err(db_err)?;
        let rows: Vec<String> =
            stmt.query_map(params![id.as_str()], |row| row.get(0)).map_err(db_err)?.collect::<Result<_, _>>().map_err(db_err)?;
        drop(stmt);
        filter_dependencies_by_kind(rows, kinds)
    }

    fn get_dependents(&mut self, id: &ElementId, kinds: Option<&[DependencyKind]>) -> CoreResult<Vec<Dependency>> {
        let mut stmt = self.guard.prepare("SELECT data FROM dependencies WHERE blocker_id = ?1").map_err(db_err)?;
        let rows: Vec<String> =
            stmt.query_map(params![id.as_str()], |row| row.get(0)).map_err(db_err)?.collect::<Result<_, _>>().map_err(db_err)?;
        drop(stmt);
        filter_dependencies_by_kind(rows, kinds)
    }

    fn remove_dependencies_touching(&mut self, id: &ElementId) -> CoreResult<Vec<Dependency>> {
        let mut stmt = self
            .guard
            .prepare("SELECT data FROM dependencies WHERE blocked_id = ?1 OR blocker_id = ?1")
            .map_err(db_err)?;
        let rows: Vec<String> =
            stmt.query_map(params![id.as_str()], |row| row.get(0)).map_err(db_err)?.collect::<Result<_, _>>().map_err(db_err)?;
        drop(stmt);
        let removed: CoreResult<Vec<Dependency>> =
            rows.into_iter().map(|json| serde_json::from_str(&json).map_err(json_err)).collect();
        let removed = removed?;
        self.guard
            .execute("DELETE FROM dependencies WHERE blocked_id = ?1 OR blocker_id = ?1", params![id.as_str()])
            .map_err(db_err)?;
        Ok(removed)
    }

    fn append_event(&mut self, event: &Event) -> CoreResult<()> {
        let data = serde_json::to_string(event).map_err(json_err)?;
        self.guard
            .execute(
                "INSERT INTO events (id, element_id, timestamp, data) VALUES (?1, ?2, ?3, ?4)",
                params![event.id.as_str(), event.element_id.as_str(), event.timestamp.as_unix_millis(), data],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn list_events_for_element(&mut self, id: &ElementId) -> CoreResult<Vec<Event>> {
        let mut stmt = self
            .guard
            .prepare("SELECT data FROM events WHERE element_id = ?1 ORDER BY timestamp ASC, id ASC")
            .map_err(db_err)?;
        let rows: Vec<String> =
            stmt.query_map(params![id.as_str()], |row| row.get(0)).map_err(db_err)?.collect::<Result<_, _>>().map_err(db_err)?;
        drop(stmt);
        rows.into_iter().map(|json| serde_json::from_str(&json).map_err(json_err)).collect()
    }

    fn list_events(&mut self, limit: usize, offset: usize) -> CoreResult<Vec<Event>> {
        let mut stmt = self
            .guard
            .prepare("SELECT data FROM events ORDER BY timestamp ASC, id ASC LIMIT ?1 OFFSET ?2")
            .map_err(db_err)?;
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset_i64 = i64::try_from(offset).unwrap_or(i64::MAX);
        let rows: Vec<String> = stmt
            .query_map(params![limit_i64, offset_i64], |row| row.get(0))
            .map_err(db_err)?
            .collect::<Result<_, _>>()
            .map_err(db_err)?;
        drop(stmt);
        rows.into_iter().map(|json| serde_json::from_str(&json).map_err(json_err)).collect()
    }

    fn upsert_blocked_row(&mut self, row: &BlockedCacheRow) -> CoreResult<()> {
        let data = serde_json::to_string(row).map_err(json_err)?;
        self.guard
            .execute(
                "INSERT INTO blocked_cache (element_id, blocked_by, data) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(element_id) DO UPDATE SET blocked_by = excluded.blocked_by, data = excluded.data",
                params![row.element_id.as_str(), row.blocked_by.as_str(), data],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn delete_blocked_row(&mut self, id: &ElementId) -> CoreResult<()> {
        self.guard.execute("DELETE FROM blocked_cache WHERE element_id = ?1", params![id.as_str()]).map_err(db_err)?;
        Ok(())
    }

    fn get_blocked_row(&mut self, id: &ElementId) -> CoreResult<Option<BlockedCacheRow>> {
        let data: Option<String> = self
            .guard
            .query_row("SELECT data FROM blocked_cache WHERE element_id = ?1", params![id.as_str()], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        data.map(|json| serde_json::from_str(&json).map_err(json_err)).transpose()
    }

    fn list_blocked_rows(&mut self) -> CoreResult<Vec<BlockedCacheRow>> {
        let mut stmt = self.guard.prepare("SELECT data FROM blocked_cache").map_err(db_err)?;
        let rows: Vec<String> =
            stmt.query_map(params![], |row| row.get(0)).map_err(db_err)?.collect::<Result<_, _>>().map_err(db_err)?;
        drop(stmt);
        rows.into_iter().map(|json| serde_json::from_str(&json).map_err(json_err)).collect()
    }

    fn list_blocked_by(&mut self, blocker_id: &ElementId) -> CoreResult<Vec<BlockedCacheRow>> {
        let mut stmt = self.guard.prepare("SELECT data FROM blocked_cache WHERE blocked_by = ?1").map_err(db_err)?;
        let rows: Vec<String> = stmt
            .query_map(params![blocker_id.as_str()], |row| row.get(0))
            .map_err(db_err)?
            .collect::<Result<_, _>>()
            .map_err(db_err)?;
        drop(stmt);
        rows.into_iter().map(|json| serde_json::from_str(&json).map_err(json_err)).collect()
    }

    fn clear_blocked_rows(&mut self) -> CoreResult<()> {
        self.guard.execute("DELETE FROM blocked_cache", params![]).map_err(db_err)?;
        Ok(())
    }

    fn commit(mut self) -> CoreResult<()> {
        self.guard.execute_batch("COMMIT").map_err(db_err)?;
        self.done = true;
        Ok(())
    }

    fn rollback(mut self) -> CoreResult<()> {
        self.guard.execute_batch("ROLLBACK").map_err(db_err)?;
        self.done = true;
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Decodes dependency rows and keeps only those matching `kinds` (all kinds
/// pass when `kinds` is `None`).
fn filter_dependencies_by_kind(rows: Vec<String>, kinds: Option<&[DependencyKind]>) -> CoreResult<Vec<Dependency>> {
    let mut deps = Vec::with_capacity(rows.len());
    for json in rows {
        let dep: Dependency = serde_json::from_str(&json).map_err(json_err)?;
        if kinds.is_none_or(|kinds| kinds.contains(&dep.kind)) {
            deps.push(dep);
        }
    }
    Ok(deps)
}

/// Substring match over an element's searchable text, mirroring the
/// in-memory store's `search()` semantics.
fn element_matches_query(element: &Element, needle: &str) -> bool {
    match &element.payload {
        ElementPayload::Task(task) => task.title.to_lowercase().contains(needle),
        ElementPayload::Plan(plan) => plan.title.to_lowercase().contains(needle),
        ElementPayload::Document(document) => {
            document.title.as_deref().is_some_and(|title| title.to_lowercase().contains(needle))
                || String::from_utf8_lossy(&document.content).to_lowercase().contains(needle)
        }
        ElementPayload::Channel(_) | ElementPayload::Message(_) | ElementPayload::Entity(_) => false,
    }
}

/// Increments the counter for `key` in an association list, appending a new
/// entry if absent.
fn bump<K: PartialEq>(rows: &mut Vec<(K, u64)>, key: K) {
    match rows.iter_mut().find(|(existing, _)| *existing == key) {
        Some((_, count)) => *count += 1,
        None => rows.push((key, 1)),
    }
}

/// Round-trips a value through its snake_case wire string and back, used by
/// tests that want to assert the column encoding is stable.
#[cfg(test)]
fn round_trip_enum_text<T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug>(value: T) {
    let text = enum_text(&value).expect("encode");
    let decoded: T = enum_from_text(&text).expect("decode");
    assert_eq!(value, decoded);
}

#[cfg(test)]
mod tests {
    use stoneforge_core::model::Complexity;
    use stoneforge_core::model::DependencyMetadata;
    use stoneforge_core::model::EntityId;
    use stoneforge_core::model::Priority;
    use stoneforge_core::model::Task;
    use stoneforge_core::model::TaskStatus;
    use stoneforge_core::model::TaskType;
    use stoneforge_core::model::Timestamp;

    use super::*;

    fn sample_element(id: &str) -> Element {
        Element {
            id: ElementId::from_raw(id),
            created_at: Timestamp::from_unix_millis(0),
            updated_at: Timestamp::from_unix_millis(0),
            created_by: EntityId::new("tester"),
            tags: Vec::new(),
            metadata: Default::default(),
            deleted_at: None,
            payload: ElementPayload::Task(Task {
                title: "sample".to_string(),
                status: TaskStatus::Open,
                priority: Priority::Medium,
                complexity: Complexity::Medium,
                task_type: TaskType::Task,
                assignee: None,
                acceptance_criteria: None,
                closed_at: None,
            }),
        }
    }

    #[test]
    fn enum_text_round_trips() {
        round_trip_enum_text(ElementKind::Task);
        round_trip_enum_text(DependencyKind::Awaits);
        round_trip_enum_text(TaskStatus::Blocked);
    }

    #[test]
    fn insert_and_get_element_round_trips() {
        let store = SqliteStore::open_in_memory().expect("open");
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&sample_element("el-abc")).expect("insert");
        tx.commit().expect("commit");

        let mut tx2 = store.begin().expect("begin");
        let fetched = tx2.get_element(&ElementId::from_raw("el-abc")).expect("get").expect("present");
        assert_eq!(fetched.id, ElementId::from_raw("el-abc"));
    }

    #[test]
    fn insert_element_rejects_duplicate_id() {
        let store = SqliteStore::open_in_memory().expect("open");
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&sample_element("el-abc")).expect("first insert");
        let result = tx.insert_element(&sample_element("el-abc"));
        assert!(matches!(result, Err(CoreError::AlreadyExists(_))));
    }

    #[test]
    fn rollback_discards_writes() {
        let store = SqliteStore::open_in_memory().expect("open");
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&sample_element("el-abc")).expect("insert");
        tx.rollback().expect("rollback");

        let mut tx2 = store.begin().expect("begin");
        assert!(tx2.get_element(&ElementId::from_raw("el-abc")).expect("get").is_none());
    }

    #[test]
    fn dropping_without_commit_rolls_back() {
        let store = SqliteStore::open_in_memory().expect("open");
        {
            let mut tx = store.begin().expect("begin");
            tx.insert_element(&sample_element("el-abc")).expect("insert");
        }
        let mut tx2 = store.begin().expect("begin");
        assert!(tx2.get_element(&ElementId::from_raw("el-abc")).expect("get").is_none());
    }

    #[test]
    fn dependency_round_trip_and_kind_filter() {
        let store = SqliteStore::open_in_memory().expect("open");
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&sample_element("el-aaa")).expect("a");
        tx.insert_element(&sample_element("el-bbb")).expect("b");
        tx.insert_dependency(&Dependency {
            blocked_id: ElementId::from_raw("el-aaa"),
            blocker_id: ElementId::from_raw("el-bbb"),
            kind: DependencyKind::Blocks,
            metadata: DependencyMetadata::None,
            created_at: Timestamp::from_unix_millis(0),
            created_by: EntityId::new("tester"),
        })
        .expect("insert dependency");

        let deps = tx.get_dependencies(&ElementId::from_raw("el-aaa"), Some(&[DependencyKind::Blocks])).expect("get");
        assert_eq!(deps.len(), 1);
        let none = tx.get_dependencies(&ElementId::from_raw("el-aaa"), Some(&[DependencyKind::Awaits])).expect("get");
        assert!(none.is_empty());
    }

    #[test]
    fn blocked_row_upsert_is_idempotent_on_conflict() {
        let store = SqliteStore::open_in_memory().expect("open");
        let mut tx = store.begin().expect("begin");
        let row = BlockedCacheRow {
            element_id: ElementId::from_raw("el-aaa"),
            blocked_by: ElementId::from_raw("el-bbb"),
            reason: stoneforge_core::model::BlockReason::blocked_by(&ElementId::from_raw("el-bbb")),
            previous_status: Some(TaskStatus::Open),
        };
        tx.upsert_blocked_row(&row).expect("first upsert");
        tx.upsert_blocked_row(&row).expect("second upsert");
        assert_eq!(tx.list_blocked_rows().expect("list").len(), 1);
    }

    #[test]
    fn list_elements_paginates_after_tag_filter() {
        let store = SqliteStore::open_in_memory().expect("open");
        let mut tx = store.begin().expect("begin");
        for id in ["el-aaa", "el-bbb", "el-ccc"] {
            let mut element = sample_element(id);
            element.tags = vec!["urgent".to_string()];
            tx.insert_element(&element).expect("insert");
        }
        let filter = ElementFilter { tags: vec!["urgent".to_string()], limit: 2, ..ElementFilter::default() };
        let page = tx.list_elements(&filter).expect("list");
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn schema_survives_reopen_of_the_same_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stoneforge.db");
        let config = SqliteStoreConfig { path: path.clone(), ..SqliteStoreConfig::default() };
        {
            let store = SqliteStore::open(&config).expect("open");
            let mut tx = store.begin().expect("begin");
            tx.insert_element(&sample_element("el-abc")).expect("insert");
            tx.commit().expect("commit");
        }
        let store = SqliteStore::open(&config).expect("reopen");
        let mut tx = store.begin().expect("begin");
        assert!(tx.get_element(&ElementId::from_raw("el-abc")).expect("get").is_some());
    }
}
