//! SQLite database module for capaian
//!
//! All engine state lives here. Structure records (programs, courses,
//! outcomes, weights, mappings) are written through [`catalog`], leaf scores
//! through [`scores`], and the computed-score cache exclusively through the
//! recompute orchestrator.

mod catalog;
mod schema;
pub(crate) mod scores;

use std::path::Path;

use rusqlite::Connection;

use crate::error::{CapaianError, Result};

pub use schema::create_schema;

/// Database file name inside the store root
pub const DB_FILE: &str = "capaian.db";

/// SQLite database for capaian
#[derive(Debug)]
pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    /// Open or create the database at the given store root
    pub fn open(store_root: &Path) -> Result<Self> {
        let db_path = store_root.join(DB_FILE);

        let conn = Connection::open(&db_path).map_err(|e| {
            CapaianError::Other(format!(
                "failed to open database at {}: {}",
                db_path.display(),
                e
            ))
        })?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| CapaianError::Other(format!("failed to enable WAL mode: {}", e)))?;

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| CapaianError::Other(format!("failed to enable foreign keys: {}", e)))?;

        create_schema(&conn)
            .map_err(|e| CapaianError::Other(format!("failed to create database schema: {}", e)))?;

        Ok(Database { conn })
    }

    /// Open an in-memory database (tests and dry runs)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        create_schema(&conn)?;
        Ok(Database { conn })
    }

    /// Borrow the underlying connection for read-only composition
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Does a row exist in `table` with the given id?
    pub(crate) fn exists(&self, table: &str, id: &str) -> Result<bool> {
        // table names come from a fixed set inside this crate, never from input
        let sql = format!("SELECT 1 FROM {} WHERE id = ?1 LIMIT 1", table);
        let found = self
            .conn
            .query_row(&sql, [id], |_| Ok(()))
            .map(|_| true)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(false),
                other => Err(other),
            })?;
        Ok(found)
    }
}
