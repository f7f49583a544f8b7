//! Snapshot slot repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the whole serialized entry collection under one named slot.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - `save` replaces the full payload of a slot; there is no append path.
//! - A slot holds either nothing or the last successfully committed payload.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, DbError};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Slot holding the calorie entry collection.
pub const CALORIES_SLOT: &str = "calories-v1";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for slot persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Connection was handed over before migrations reached the latest version.
    SchemaNotReady { found: u32, expected: u32 },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::SchemaNotReady { found, expected } => write!(
                f,
                "snapshot schema version {found} does not match expected {expected}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::SchemaNotReady { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable key-value blob store for whole-collection snapshots.
pub trait SnapshotRepository: Send {
    fn load(&self, slot: &str) -> RepoResult<Option<String>>;
    fn save(&mut self, slot: &str, payload: &str) -> RepoResult<()>;
}

/// SQLite-backed slot repository.
///
/// Owns its connection so a store built on it can live for the whole process.
pub struct SqliteSnapshotRepository {
    conn: Connection,
}

impl SqliteSnapshotRepository {
    /// Wraps a connection that has already been migrated.
    ///
    /// # Errors
    /// - `SchemaNotReady` when the connection did not go through `open_db*`.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        let found = current_user_version(&conn)?;
        let expected = latest_version();
        if found != expected {
            return Err(RepoError::SchemaNotReady { found, expected });
        }
        Ok(Self { conn })
    }

    /// Opens (or creates) a database file and wraps it.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        let conn = open_db(path)?;
        Self::try_new(conn)
    }
}

impl SnapshotRepository for SqliteSnapshotRepository {
    fn load(&self, slot: &str) -> RepoResult<Option<String>> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM kv_slots WHERE slot = ?1;",
                [slot],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn save(&mut self, slot: &str, payload: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO kv_slots (slot, payload, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(slot) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at;",
            params![slot, payload, now_epoch_ms()],
        )?;
        Ok(())
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}
