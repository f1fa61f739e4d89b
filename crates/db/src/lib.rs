//! SQLite store for BookSwap.
//!
//! A single [`rusqlite::Connection`] is shared behind a mutex. Reads go through
//! [`Database::read`]; anything that touches more than one row goes through
//! [`Database::write`], which wraps the closure in an immediate transaction so
//! the check and the mutation observe the same snapshot.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use thiserror::Error;

/// Pragmas applied to every connection before migrations run.
const CONNECTION_PRAGMAS: &str = "
    PRAGMA foreign_keys = ON;
    PRAGMA busy_timeout = 5000;
";

/// Bookkeeping table for applied migrations.
const MIGRATIONS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS _migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT (datetime('now')),
        PRIMARY KEY (module, id)
    );
";

/// Registers `casefold(text)`, a Unicode-aware lowercase. SQLite's built-in
/// `lower()` and `LIKE` only fold ASCII.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|text| text.to_lowercase())),
    )
}

/// Errors raised by the store itself.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration {module}/{id} failed: {source}")]
    Migration {
        module: String,
        id: String,
        #[source]
        source: rusqlite::Error,
    },
}

/// A migration owned by a module, applied at most once.
#[derive(Debug, Clone)]
pub struct MigrationStep {
    pub module: String,
    pub id: &'static str,
    pub up: &'static str,
}

/// Shared handle to the SQLite store. Cloning is cheap.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at `path`. `:memory:` opens a private
    /// in-memory database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        if path.as_os_str() == ":memory:" {
            return Self::in_memory();
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;

        tracing::info!(target: "bookswap-db", path = %path.display(), "opened database");
        Self::from_connection(conn)
    }

    /// Creates an in-memory database, mostly for tests.
    pub fn in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        register_functions(&conn)?;
        conn.execute_batch(MIGRATIONS_TABLE)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection without a transaction.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let conn = self.conn.lock();
        f(&*conn)
    }

    /// Runs `f` inside an immediate transaction. The transaction commits when
    /// `f` returns `Ok` and rolls back otherwise.
    pub fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DbError::from)?;

        // Dropping `tx` without commit rolls back.
        let value = f(&*tx)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }

    /// Applies every migration not yet recorded in `_migrations`, in the
    /// order given. Each migration runs in its own transaction.
    pub fn migrate(&self, steps: &[MigrationStep]) -> Result<usize, DbError> {
        let mut conn = self.conn.lock();
        let mut applied = 0;

        for step in steps {
            let done = conn
                .query_row(
                    "SELECT 1 FROM _migrations WHERE module = ?1 AND id = ?2",
                    params![step.module, step.id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if done {
                continue;
            }

            let wrap = |source| DbError::Migration {
                module: step.module.clone(),
                id: step.id.to_string(),
                source,
            };

            let tx = conn.transaction().map_err(wrap)?;
            tx.execute_batch(step.up).map_err(wrap)?;
            tx.execute(
                "INSERT INTO _migrations (module, id) VALUES (?1, ?2)",
                params![step.module, step.id],
            )
            .map_err(wrap)?;
            tx.commit().map_err(wrap)?;

            tracing::info!(
                target: "bookswap-db",
                module = %step.module,
                migration = step.id,
                "applied migration"
            );
            applied += 1;
        }

        Ok(applied)
    }
}

/// True when `err` is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
