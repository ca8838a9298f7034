// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes. Other processes
//! touching the same file are fenced off by `busy_timeout` plus IMMEDIATE
//! transactions in the query modules.

use std::path::Path;
use std::time::Duration;

use tokio_rusqlite::Connection;

use bookline_core::BooklineError;

/// How long a blocked statement waits for a competing writer before the
/// operation fails with [`BooklineError::LockTimeout`].
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle to the SQLite database behind the dedup store.
///
/// Wraps a single `tokio_rusqlite::Connection`; cloning the inner connection
/// clones a handle to the same background thread, never a second writer.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run all
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, BooklineError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| map_tr_err(e.into()))?;

        let pragmas = format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = {};
             PRAGMA foreign_keys = ON;",
            BUSY_TIMEOUT.as_millis()
        );
        conn.call(move |conn| {
            conn.execute_batch(&pragmas)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call_unwrap(crate::migrations::run_migrations).await?;

        Ok(Self { conn })
    }

    /// Returns the underlying tokio-rusqlite connection handle.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), BooklineError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(map_tr_err)
    }
}

/// Map a tokio-rusqlite error into the crate error type.
///
/// SQLITE_BUSY / SQLITE_LOCKED become [`BooklineError::LockTimeout`] so
/// callers can tell "another process held the store too long" apart from
/// data-level failures.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> BooklineError {
    if let tokio_rusqlite::Error::Error(rusqlite::Error::SqliteFailure(err, _)) = &e
        && matches!(
            err.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        )
    {
        return BooklineError::LockTimeout {
            duration: BUSY_TIMEOUT,
        };
    }
    BooklineError::Storage {
        source: Box::new(e),
    }
}
