// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Bookline notification pipeline.

use thiserror::Error;

/// The primary error type used across all Bookline crates.
#[derive(Debug, Error)]
pub enum BooklineError {
    /// A single appointment event is unusable (missing id, malformed
    /// timestamp, invalid phone number). Local to one item; callers log
    /// and continue with the rest of the batch.
    #[error("validation error: {0}")]
    Validation(String),

    /// Template resolution or rendering failed (missing bundle, absent
    /// placeholder). Caught per-appointment, never fatal.
    #[error("template error: {0}")]
    Template(String),

    /// Transient failure talking to an external service (poll API,
    /// messaging gateway).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Storage backend errors (database open, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The exclusive store lock was not acquired within the bound.
    /// Surfaced as a failure return, never a deadlock.
    #[error("storage lock not acquired within {duration:?}")]
    LockTimeout { duration: std::time::Duration },

    /// Configuration errors (missing credentials, malformed values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Ledger file IO errors.
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
