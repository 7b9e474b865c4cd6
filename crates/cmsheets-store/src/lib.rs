//! # cmsheets-store
//!
//! SQLite persistence for cmsheets.
//!
//! One database file holds the property bags and the recurring job registry
//! of any number of documents:
//! - `SqlitePropertyStore`: `PropertyStore` for one document and one user
//! - `SqliteJobScheduler`: `JobScheduler` for one document
//!
//! ## Example
//!
//! ```rust
//! use cmsheets_core::{PropertyStore, Scope};
//! use cmsheets_store::Database;
//!
//! let db = Database::open_in_memory().unwrap();
//! let props = db.properties("doc-1", "ana@example.com");
//! props.set(Scope::Document, "7_REPORT_ID", "r1").unwrap();
//! assert_eq!(props.get(Scope::Document, "7_REPORT_ID").unwrap().as_deref(), Some("r1"));
//! ```

pub mod jobs;
pub mod properties;

pub use jobs::{JobRecord, SqliteJobScheduler};
pub use properties::SqlitePropertyStore;

use std::path::Path;

use cmsheets_core::StoreError;
use rusqlite::Connection;
use thiserror::Error;
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS properties (
    scope TEXT NOT NULL,
    owner TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (scope, owner, key)
);

CREATE TABLE IF NOT EXISTS jobs (
    handle TEXT PRIMARY KEY,
    document TEXT NOT NULL,
    handler TEXT NOT NULL,
    recurrence TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS jobs_by_document ON jobs (document);
";

/// Failure opening or migrating the database
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared SQLite database
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the database file, creating parent directories
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        debug!(path = %path.display(), "database opened");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Property bags of `document` as seen by `user`
    pub fn properties<'a>(&'a self, document: &str, user: &str) -> SqlitePropertyStore<'a> {
        SqlitePropertyStore::new(&self.conn, document, user)
    }

    /// Job registry of `document`
    pub fn jobs<'a>(&'a self, document: &str) -> SqliteJobScheduler<'a> {
        SqliteJobScheduler::new(&self.conn, document)
    }
}

pub(crate) fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}
