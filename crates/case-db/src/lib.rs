//! # case-db
//!
//! Persistence and lifecycle management for Casebook cases.
//!
//! A case is stored as one core row (scalar fields plus one JSON document per
//! investigation phase) and a set of normalized child tables that cascade
//! from it. [`repository::CaseRepository`] reconciles the two halves into a
//! single unit of work; [`repos::LibSqlCaseRepository`] implements it on
//! libSQL and [`memory::InMemoryCaseRepository`] in process memory.
//! [`manager::CaseManager`] adds ownership checks on top.
//!
//! Uses the `libsql` crate (C `SQLite` fork, v0.9.29) for native FTS5 and
//! embedded local files.

pub mod error;
pub mod helpers;
pub mod manager;
pub mod memory;
mod migrations;
pub mod repos;
pub mod repository;
pub mod updates;

#[cfg(test)]
mod test_support;

use std::path::Path;
use std::time::Duration;

use case_config::DatabaseConfig;
use error::DatabaseError;
use libsql::Builder;

/// Handle on one libSQL database and the connection all units of work share.
pub struct CaseDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl CaseDb {
    /// Open a local database at the given path with the default busy timeout.
    ///
    /// Runs migrations automatically on first open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        Self::open(&DatabaseConfig {
            path: path.to_string(),
            ..DatabaseConfig::default()
        })
        .await
    }

    /// Open the database described by `config`, creating parent directories
    /// for file-backed stores.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory, database, pragmas, or
    /// migrations fail.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        if !config.is_in_memory() {
            if let Some(parent) = Path::new(&config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        DatabaseError::Migration(format!(
                            "create directory {}: {e}",
                            parent.display()
                        ))
                    })?;
                }
            }
        }

        let db = Builder::new_local(&config.path).build().await?;
        let conn = db.connect()?;

        // Enable foreign keys (must be per-connection in SQLite)
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;
        let timeout = Duration::from_millis(config.busy_timeout_ms);
        conn.query(&format!("PRAGMA busy_timeout = {}", timeout.as_millis()), ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA busy_timeout: {e}")))?;
        if !config.is_in_memory() {
            conn.query("PRAGMA journal_mode = WAL", ())
                .await
                .map_err(|e| DatabaseError::Migration(format!("PRAGMA journal_mode: {e}")))?;
        }

        let case_db = Self { db, conn };
        case_db.run_migrations().await?;
        tracing::debug!(path = %config.path, "case store opened");
        Ok(case_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }
}
