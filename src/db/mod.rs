// src/db/mod.rs

//! Index cache database
//!
//! Parsing the dpkg status file and every apt list on each start is slow on
//! systems with large mirrors. The parsed index is kept in SQLite together
//! with the size and modification time of every source file it came from, so
//! an unchanged system loads straight from the cache.

pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::{debug, info};

/// Create (or open) the cache database and bring its schema up to date
///
/// Idempotent: calling it on an existing database is safe.
pub fn init(db_path: &Path) -> Result<Connection> {
    debug!("Initializing index cache at: {}", db_path.display());

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::InitError(format!("Failed to create cache directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    schema::migrate(&conn)?;

    info!("Index cache ready at {}", db_path.display());
    Ok(conn)
}

/// Open an existing cache database
pub fn open(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        return Err(Error::NotFound(format!("index cache {}", db_path.display())));
    }

    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    Ok(conn)
}

/// Run `f` inside a transaction, committing only if it succeeds
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_database() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("cache/index.db");

        let result = init(&db_path);
        assert!(result.is_ok());
        assert!(db_path.exists());
    }

    #[test]
    fn test_open_existing_database() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("index.db");

        init(&db_path).unwrap();
        assert!(open(&db_path).is_ok());
    }

    #[test]
    fn test_open_nonexistent_database() {
        let result = open(Path::new("/nonexistent/path/index.db"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let dir = tempdir().unwrap();
        let mut conn = init(&dir.path().join("index.db")).unwrap();

        let result: Result<()> = transaction(&mut conn, |tx| {
            tx.execute(
                "INSERT INTO index_sources (path, size, modified) VALUES ('/a', 1, 2)",
                [],
            )?;
            Err(Error::InvalidState("abort".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM index_sources", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
