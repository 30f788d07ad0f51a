// crates/capgate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite State Store
// Description: Durable grant, principal, and alias backends on SQLite WAL.
// Purpose: Persist gateway state with versioned, crash-safe writes.
// Dependencies: capgate-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! One `SQLite` database holds three tables: capability grant snapshots
//! keyed by origin, principal records keyed by credential fingerprint, and
//! the bidirectional alias mapping. Every mutation runs inside a
//! transaction. Grant rows carry a version column checked on write, which
//! gives the compare-and-swap semantics [`capgate_core::GrantStore`]
//! requires; the full snapshot is replaced, never patched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;
use capgate_core::Alias;
use capgate_core::AliasBinding;
use capgate_core::AliasStore;
use capgate_core::GrantRecord;
use capgate_core::GrantStore;
use capgate_core::Namespace;
use capgate_core::Origin;
use capgate_core::Principal;
use capgate_core::PrincipalId;
use capgate_core::PrincipalStore;
use capgate_core::StoreError;
use capgate_core::VersionedGrant;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
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

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
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
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
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

/// Store configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// Synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Default busy timeout for serde.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never include database paths or tenant data.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Database operation failed.
    #[error("sqlite failure: {0}")]
    Db(String),
    /// Stored record failed to serialize or deserialize.
    #[error("record serialization failure: {0}")]
    Serialize(String),
    /// Schema version on disk is not supported.
    #[error("unsupported schema version: {0}")]
    Schema(i64),
}

impl From<SqliteStoreError> for StoreError {
    fn from(err: SqliteStoreError) -> Self {
        match err {
            SqliteStoreError::Db(message) => Self::Backend(message),
            SqliteStoreError::Serialize(message) => Self::Corrupt(message),
            SqliteStoreError::Schema(version) => {
                Self::Backend(format!("unsupported schema version {version}"))
            }
        }
    }
}

/// Maps a rusqlite error into a store error without leaking paths.
fn db_err(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable state store over one `SQLite` database.
///
/// # Invariants
/// - All mutations run inside transactions; readers never observe a
///   half-written snapshot.
/// - The connection is guarded by a mutex; statement-level concurrency is
///   delegated to `SQLite` WAL.
pub struct SqliteStateStore {
    /// Guarded database connection.
    connection: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Opens (and migrates) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// the schema is unsupported.
    pub fn open(path: &Path, config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let connection = Connection::open(path).map_err(|err| db_err(&err))?;
        Self::initialize(connection, config)
    }

    /// Opens an in-memory store (tests and ephemeral deployments).
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when initialization fails.
    pub fn open_in_memory(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let connection = Connection::open_in_memory().map_err(|err| db_err(&err))?;
        Self::initialize(connection, config)
    }

    /// Applies pragmas and migrates the schema.
    fn initialize(
        mut connection: Connection,
        config: &SqliteStoreConfig,
    ) -> Result<Self, SqliteStoreError> {
        connection
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|err| db_err(&err))?;
        connection
            .execute_batch(&format!(
                "PRAGMA journal_mode = {};",
                config.journal_mode.pragma_value()
            ))
            .map_err(|err| db_err(&err))?;
        connection
            .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
            .map_err(|err| db_err(&err))?;
        connection
            .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
            .map_err(|err| db_err(&err))?;

        let tx = connection.transaction().map_err(|err| db_err(&err))?;
        tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
            .map_err(|err| db_err(&err))?;
        let existing: Option<i64> = tx
            .query_row("SELECT version FROM store_meta LIMIT 1", [], |row| row.get(0))
            .optional()
            .map_err(|err| db_err(&err))?;
        match existing {
            None => {
                tx.execute_batch(
                    "CREATE TABLE IF NOT EXISTS grants (
                        origin TEXT PRIMARY KEY,
                        version INTEGER NOT NULL,
                        record TEXT NOT NULL
                    );
                    CREATE TABLE IF NOT EXISTS principals (
                        fingerprint TEXT PRIMARY KEY,
                        principal_id TEXT NOT NULL UNIQUE,
                        record TEXT NOT NULL
                    );
                    CREATE TABLE IF NOT EXISTS aliases (
                        alias TEXT PRIMARY KEY,
                        namespace TEXT NOT NULL UNIQUE
                    );",
                )
                .map_err(|err| db_err(&err))?;
                tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![
                    SCHEMA_VERSION
                ])
                .map_err(|err| db_err(&err))?;
            }
            Some(version) if version == SCHEMA_VERSION => {}
            Some(version) => return Err(SqliteStoreError::Schema(version)),
        }
        tx.commit().map_err(|err| db_err(&err))?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Locks the connection, converting poisoning into a store error.
    fn locked(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("connection lock poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Grant Backend
// ============================================================================

#[async_trait]
impl GrantStore for SqliteStateStore {
    async fn load(&self, origin: &Origin) -> Result<Option<VersionedGrant>, StoreError> {
        let guard = self.locked()?;
        let row: Option<(i64, String)> = guard
            .query_row(
                "SELECT version, record FROM grants WHERE origin = ?1",
                params![origin.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let Some((version, json)) = row else {
            return Ok(None);
        };
        let record: GrantRecord = serde_json::from_str(&json)
            .map_err(|err| StoreError::Corrupt(format!("grant record: {err}")))?;
        let version =
            u64::try_from(version).map_err(|_| StoreError::Corrupt("grant version".to_string()))?;
        Ok(Some(VersionedGrant {
            version,
            record,
        }))
    }

    async fn store(
        &self,
        origin: &Origin,
        expected_version: Option<u64>,
        record: &GrantRecord,
    ) -> Result<bool, StoreError> {
        let json = serde_json::to_string(record)
            .map_err(|err| StoreError::Corrupt(format!("grant record: {err}")))?;
        let mut guard = self.locked()?;
        let tx = guard.transaction().map_err(|err| StoreError::from(db_err(&err)))?;
        let current: Option<i64> = tx
            .query_row(
                "SELECT version FROM grants WHERE origin = ?1",
                params![origin.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let current = match current {
            Some(version) => Some(
                u64::try_from(version)
                    .map_err(|_| StoreError::Corrupt("grant version".to_string()))?,
            ),
            None => None,
        };
        if current != expected_version {
            return Ok(false);
        }
        let next = i64::try_from(current.unwrap_or(0) + 1)
            .map_err(|_| StoreError::Corrupt("grant version overflow".to_string()))?;
        tx.execute(
            "INSERT INTO grants (origin, version, record) VALUES (?1, ?2, ?3)
             ON CONFLICT(origin) DO UPDATE SET version = ?2, record = ?3",
            params![origin.as_str(), next, json],
        )
        .map_err(|err| StoreError::from(db_err(&err)))?;
        tx.commit().map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(true)
    }

    async fn remove(&self, origin: &Origin) -> Result<(), StoreError> {
        let guard = self.locked()?;
        guard
            .execute("DELETE FROM grants WHERE origin = ?1", params![origin.as_str()])
            .map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(())
    }

    async fn remove_if(
        &self,
        origin: &Origin,
        expected_version: u64,
    ) -> Result<bool, StoreError> {
        let expected = i64::try_from(expected_version)
            .map_err(|_| StoreError::Corrupt("grant version".to_string()))?;
        let guard = self.locked()?;
        let deleted = guard
            .execute(
                "DELETE FROM grants WHERE origin = ?1 AND version = ?2",
                params![origin.as_str(), expected],
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(deleted == 1)
    }
}

// ============================================================================
// SECTION: Principal Backend
// ============================================================================

#[async_trait]
impl PrincipalStore for SqliteStateStore {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let guard = self.locked()?;
        let json: Option<String> = guard
            .query_row(
                "SELECT record FROM principals WHERE fingerprint = ?1",
                params![fingerprint],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        json.map(|json| {
            serde_json::from_str(&json)
                .map_err(|err| StoreError::Corrupt(format!("principal record: {err}")))
        })
        .transpose()
    }

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError> {
        let guard = self.locked()?;
        let json: Option<String> = guard
            .query_row(
                "SELECT record FROM principals WHERE principal_id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        json.map(|json| {
            serde_json::from_str(&json)
                .map_err(|err| StoreError::Corrupt(format!("principal record: {err}")))
        })
        .transpose()
    }

    async fn insert(&self, principal: &Principal) -> Result<bool, StoreError> {
        let json = serde_json::to_string(principal)
            .map_err(|err| StoreError::Corrupt(format!("principal record: {err}")))?;
        let guard = self.locked()?;
        let result = guard.execute(
            "INSERT OR IGNORE INTO principals (fingerprint, principal_id, record)
             VALUES (?1, ?2, ?3)",
            params![principal.secret_hash, principal.id.to_string(), json],
        );
        match result {
            Ok(inserted) => Ok(inserted == 1),
            Err(err) => Err(StoreError::from(db_err(&err))),
        }
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let guard = self.locked()?;
        let count: i64 = guard
            .query_row("SELECT COUNT(*) FROM principals", [], |row| row.get(0))
            .map_err(|err| StoreError::from(db_err(&err)))?;
        u64::try_from(count).map_err(|_| StoreError::Corrupt("principal count".to_string()))
    }

    async fn set_active(&self, id: PrincipalId, active: bool) -> Result<(), StoreError> {
        let mut guard = self.locked()?;
        let tx = guard.transaction().map_err(|err| StoreError::from(db_err(&err)))?;
        let json: Option<String> = tx
            .query_row(
                "SELECT record FROM principals WHERE principal_id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let Some(json) = json else {
            return Err(StoreError::NotFound);
        };
        let mut principal: Principal = serde_json::from_str(&json)
            .map_err(|err| StoreError::Corrupt(format!("principal record: {err}")))?;
        principal.active = active;
        let json = serde_json::to_string(&principal)
            .map_err(|err| StoreError::Corrupt(format!("principal record: {err}")))?;
        tx.execute("UPDATE principals SET record = ?1 WHERE principal_id = ?2", params![
            json,
            id.to_string()
        ])
        .map_err(|err| StoreError::from(db_err(&err)))?;
        tx.commit().map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(())
    }

    async fn remove(&self, id: PrincipalId) -> Result<(), StoreError> {
        let guard = self.locked()?;
        let deleted = guard
            .execute("DELETE FROM principals WHERE principal_id = ?1", params![id.to_string()])
            .map_err(|err| StoreError::from(db_err(&err)))?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Alias Backend
// ============================================================================

#[async_trait]
impl AliasStore for SqliteStateStore {
    async fn alias_for(&self, namespace: &Namespace) -> Result<Option<Alias>, StoreError> {
        let guard = self.locked()?;
        let value: Option<String> = guard
            .query_row(
                "SELECT alias FROM aliases WHERE namespace = ?1",
                params![namespace.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        value
            .map(|alias| {
                Alias::parse(&alias).map_err(|err| StoreError::Corrupt(err.to_string()))
            })
            .transpose()
    }

    async fn namespace_for(&self, alias: &Alias) -> Result<Option<Namespace>, StoreError> {
        let guard = self.locked()?;
        let value: Option<String> = guard
            .query_row(
                "SELECT namespace FROM aliases WHERE alias = ?1",
                params![alias.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        value
            .map(|namespace| {
                Namespace::parse(&namespace).map_err(|err| StoreError::Corrupt(err.to_string()))
            })
            .transpose()
    }

    async fn bind(
        &self,
        namespace: &Namespace,
        alias: &Alias,
    ) -> Result<AliasBinding, StoreError> {
        let mut guard = self.locked()?;
        let tx = guard.transaction().map_err(|err| StoreError::from(db_err(&err)))?;
        let existing_alias: Option<String> = tx
            .query_row(
                "SELECT alias FROM aliases WHERE namespace = ?1",
                params![namespace.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        if let Some(existing) = existing_alias {
            let existing =
                Alias::parse(&existing).map_err(|err| StoreError::Corrupt(err.to_string()))?;
            return Ok(AliasBinding::ExistingAlias(existing));
        }
        let taken_by: Option<String> = tx
            .query_row(
                "SELECT namespace FROM aliases WHERE alias = ?1",
                params![alias.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        if let Some(taken_by) = taken_by {
            if taken_by != namespace.as_str() {
                return Ok(AliasBinding::AliasTaken);
            }
        }
        tx.execute("INSERT INTO aliases (alias, namespace) VALUES (?1, ?2)", params![
            alias.as_str(),
            namespace.as_str()
        ])
        .map_err(|err| StoreError::from(db_err(&err)))?;
        tx.commit().map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(AliasBinding::Bound)
    }
}
