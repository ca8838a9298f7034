// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Bookline notification service.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and a
//! single-writer concurrency model via `tokio-rusqlite` for the appointment
//! dedup store, plus the day-partitioned JSON ledger of sent notifications.

pub mod appointments;
pub mod database;
pub mod ledger;
pub mod migrations;

pub use appointments::AppointmentRecord;
pub use database::Database;
pub use ledger::SentLedger;
