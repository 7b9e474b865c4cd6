//! Property bags in the `properties` table.
//!
//! Document properties are keyed by document id and shared by every user of
//! the document. User properties are keyed by user email and shared across
//! documents.

use cmsheets_core::{PropertyStore, Scope, StoreError};
use rusqlite::{params, Connection, OptionalExtension};

use crate::backend;

pub struct SqlitePropertyStore<'a> {
    conn: &'a Connection,
    document: String,
    user: String,
}

impl<'a> SqlitePropertyStore<'a> {
    pub fn new(conn: &'a Connection, document: &str, user: &str) -> Self {
        Self {
            conn,
            document: document.to_string(),
            user: user.to_string(),
        }
    }

    fn owner(&self, scope: Scope) -> &str {
        match scope {
            Scope::Document => &self.document,
            Scope::User => &self.user,
        }
    }

    /// Every key in `scope`, sorted
    pub fn keys(&self, scope: Scope) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM properties WHERE scope = ?1 AND owner = ?2 ORDER BY key")
            .map_err(backend)?;
        let keys = stmt
            .query_map(params![scope.as_str(), self.owner(scope)], |row| row.get(0))
            .map_err(backend)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(backend)?;
        Ok(keys)
    }
}

const UPSERT: &str = "INSERT INTO properties (scope, owner, key, value) VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT (scope, owner, key) DO UPDATE SET value = excluded.value";

const DELETE: &str = "DELETE FROM properties WHERE scope = ?1 AND owner = ?2 AND key = ?3";

impl PropertyStore for SqlitePropertyStore<'_> {
    fn get(&self, scope: Scope, key: &str) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row(
                "SELECT value FROM properties WHERE scope = ?1 AND owner = ?2 AND key = ?3",
                params![scope.as_str(), self.owner(scope), key],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)
    }

    fn set(&self, scope: Scope, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn
            .execute(UPSERT, params![scope.as_str(), self.owner(scope), key, value])
            .map_err(backend)?;
        Ok(())
    }

    fn delete(&self, scope: Scope, key: &str) -> Result<(), StoreError> {
        self.conn
            .execute(DELETE, params![scope.as_str(), self.owner(scope), key])
            .map_err(backend)?;
        Ok(())
    }

    fn delete_all(&self, scope: Scope) -> Result<(), StoreError> {
        self.conn
            .execute(
                "DELETE FROM properties WHERE scope = ?1 AND owner = ?2",
                params![scope.as_str(), self.owner(scope)],
            )
            .map_err(backend)?;
        Ok(())
    }

    /// All entries land in one transaction
    fn set_many(&self, scope: Scope, entries: &[(String, String)]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction().map_err(backend)?;
        {
            let mut stmt = tx.prepare(UPSERT).map_err(backend)?;
            for (key, value) in entries {
                stmt.execute(params![scope.as_str(), self.owner(scope), key, value])
                    .map_err(backend)?;
            }
        }
        tx.commit().map_err(backend)
    }

    /// All deletions land in one transaction
    fn delete_many(&self, scope: Scope, keys: &[String]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction().map_err(backend)?;
        {
            let mut stmt = tx.prepare(DELETE).map_err(backend)?;
            for key in keys {
                stmt.execute(params![scope.as_str(), self.owner(scope), key])
                    .map_err(backend)?;
            }
        }
        tx.commit().map_err(backend)
    }
}
