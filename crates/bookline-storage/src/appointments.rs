// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dedup store operations for appointment revisions.
//!
//! The store remembers the last `(from_date, staffname)` pair acted on per
//! appointment id. [`try_upsert`] is the single gate deciding whether an
//! incoming revision is new information; everything runs inside an IMMEDIATE
//! transaction so concurrent processes serialize on the write lock.

use chrono::{Duration, NaiveDateTime};
use rusqlite::{TransactionBehavior, params};
use tracing::warn;

use bookline_core::BooklineError;
use bookline_core::dates::{WEBHOOK_DATETIME_FORMAT, clean_date_str, parse_webhook_datetime};

use crate::database::Database;

/// Appointment rows older than this many days are swept by
/// [`cleanup_old_records`].
pub const RETENTION_DAYS: i64 = 7;

/// One row of the dedup store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentRecord {
    pub apptid: String,
    pub from_date: String,
    pub staffname: String,
}

/// Record an appointment revision, returning whether it changed the store.
///
/// * No row for `apptid`: inserts one and returns `true`.
/// * Row matches both `from_date` and `staffname`: returns `false` (duplicate).
/// * Row differs in either field: updates it and returns `true`.
///
/// The stored `from_date` is the cleaned form (escaped slashes undone,
/// whitespace trimmed) and must parse as `DD/MM/YYYY HH:MM:SS`. The stored
/// `staffname` is trimmed, with missing staff represented as the empty string.
pub async fn try_upsert(db: &Database, record: &AppointmentRecord) -> Result<bool, BooklineError> {
    let apptid = record.apptid.trim().to_string();
    if apptid.is_empty() {
        return Err(BooklineError::Validation(
            "appointment id must not be empty".to_string(),
        ));
    }
    let from_date = clean_date_str(&record.from_date);
    parse_webhook_datetime(&from_date)?;
    let staffname = record.staffname.trim().to_string();

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let existing = {
                let mut stmt =
                    tx.prepare("SELECT from_date, staffname FROM appointments WHERE apptid = ?1")?;
                stmt.query_row(params![apptid], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
            };

            match existing {
                Ok((prev_date, prev_staff)) => {
                    if prev_date == from_date && prev_staff == staffname {
                        tx.commit()?;
                        Ok(false)
                    } else {
                        tx.execute(
                            "UPDATE appointments SET from_date = ?2, staffname = ?3
                             WHERE apptid = ?1",
                            params![apptid, from_date, staffname],
                        )?;
                        tx.commit()?;
                        Ok(true)
                    }
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.execute(
                        "INSERT INTO appointments (apptid, from_date, staffname)
                         VALUES (?1, ?2, ?3)",
                        params![apptid, from_date, staffname],
                    )?;
                    tx.commit()?;
                    Ok(true)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a single record by appointment id.
pub async fn get(db: &Database, apptid: &str) -> Result<Option<AppointmentRecord>, BooklineError> {
    let apptid = apptid.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT apptid, from_date, staffname FROM appointments WHERE apptid = ?1",
                params![apptid],
                |row| {
                    Ok(AppointmentRecord {
                        apptid: row.get(0)?,
                        from_date: row.get(1)?,
                        staffname: row.get(2)?,
                    })
                },
            );
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of rows currently in the dedup store.
pub async fn count(db: &Database) -> Result<i64, BooklineError> {
    db.connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0)))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete rows whose appointment time is `RETENTION_DAYS` or more before
/// `now`. Returns the number of deleted rows.
///
/// A row exactly at the retention boundary is deleted. Rows whose stored
/// `from_date` no longer parses are kept and logged, never silently dropped.
pub async fn cleanup_old_records(
    db: &Database,
    now: NaiveDateTime,
) -> Result<usize, BooklineError> {
    let cutoff = now - Duration::days(RETENTION_DAYS);

    let (deleted, unparseable) = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut stale = Vec::new();
            let mut unparseable = 0usize;
            {
                let mut stmt = tx.prepare("SELECT apptid, from_date FROM appointments")?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;
                for row in rows {
                    let (apptid, from_date) = row?;
                    match NaiveDateTime::parse_from_str(&from_date, WEBHOOK_DATETIME_FORMAT) {
                        Ok(dt) if dt <= cutoff => stale.push(apptid),
                        Ok(_) => {}
                        Err(_) => unparseable += 1,
                    }
                }
            }

            let deleted = stale.len();
            for apptid in stale {
                tx.execute("DELETE FROM appointments WHERE apptid = ?1", params![apptid])?;
            }
            tx.commit()?;
            Ok((deleted, unparseable))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if unparseable > 0 {
        warn!(
            rows = unparseable,
            "retention sweep kept rows with unparseable from_date"
        );
    }
    Ok(deleted)
}
