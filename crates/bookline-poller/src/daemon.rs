// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background poll loop.
//!
//! Polls the booking platform on a fixed interval for today's and tomorrow's
//! appointments and hands each non-empty batch to a [`BatchHandler`]. The
//! `lu` cursor is reset when the business day rolls over, so each day starts
//! with one full read of the window.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bookline_core::dates::COMPACT_DATE_FORMAT;

use crate::client::PollClient;

/// Consumer of polled appointment batches.
#[async_trait]
pub trait BatchHandler: Send + Sync {
    /// Process one batch of raw appointment objects. Item-level failures
    /// must be absorbed by the handler; the daemon keeps polling regardless.
    async fn handle_batch(&self, batch: Vec<serde_json::Value>);
}

/// The `[from, to]` export window for a given business day: the day itself
/// and the following day, in compact `YYYYMMDD` form.
pub fn poll_window(today: NaiveDate) -> (String, String) {
    let next = today.succ_opt().unwrap_or(today);
    (
        today.format(COMPACT_DATE_FORMAT).to_string(),
        next.format(COMPACT_DATE_FORMAT).to_string(),
    )
}

/// Run the poll loop until `cancel` fires.
///
/// The first poll happens immediately; subsequent polls wait `interval`.
/// Errors are logged and the loop continues with the cursor unchanged.
pub async fn run(
    mut client: PollClient,
    interval: Duration,
    tz: Tz,
    handler: Arc<dyn BatchHandler>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_poll_day: Option<NaiveDate> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let today = Utc::now().with_timezone(&tz).date_naive();
                if last_poll_day.is_some_and(|day| day != today) {
                    debug!("business day rolled over, resetting poll cursor");
                    client.reset_cursor();
                }
                last_poll_day = Some(today);

                let (from, to) = poll_window(today);
                match client.fetch(&from, &to).await {
                    Ok(batch) if batch.is_empty() => {
                        debug!("poll returned no new appointments");
                    }
                    Ok(batch) => {
                        info!(count = batch.len(), "poll returned appointments");
                        handler.handle_batch(batch).await;
                    }
                    Err(e) => warn!(error = %e, "poll failed"),
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
    debug!("poll daemon stopped");
}
