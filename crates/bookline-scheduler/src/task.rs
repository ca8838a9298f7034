// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending-task state shared by the scheduler, dispatcher, and webhook path.
//!
//! One [`DispatchState`] per process holds the pending task map and the sent
//! ledger under a single mutex, so the "already pending / already sent" check
//! and the insert are one atomic step. The map is process-local; cross-process
//! duplicate suppression comes from the appointment dedup store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use tokio::sync::Mutex;

use bookline_storage::SentLedger;

/// The two reminder slots per appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Before,
    After,
}

/// Ledger and pending-map key for one logical notification.
pub fn task_key(apptid: &str, phase: Phase) -> String {
    format!("{apptid}_{phase}")
}

/// One scheduled notification waiting for its send time.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub key: String,
    /// Destination number as the booking system supplied it; normalized at
    /// send time.
    pub msisdn: String,
    pub message: String,
    pub send_time: DateTime<Tz>,
}

/// Shared handle to the per-process dispatch state.
pub type SharedState = Arc<Mutex<DispatchState>>;

/// Pending tasks plus the sent ledger, guarded together.
pub struct DispatchState {
    pending: HashMap<String, ScheduledTask>,
    ledger: SentLedger,
}

impl DispatchState {
    pub fn new(ledger: SentLedger) -> Self {
        Self {
            pending: HashMap::new(),
            ledger,
        }
    }

    pub fn shared(ledger: SentLedger) -> SharedState {
        Arc::new(Mutex::new(Self::new(ledger)))
    }

    /// Insert `task` unless its key is already pending or already sent.
    /// Returns whether the task was added.
    pub fn schedule(&mut self, task: ScheduledTask) -> bool {
        if self.ledger.contains(&task.key) || self.pending.contains_key(&task.key) {
            return false;
        }
        self.pending.insert(task.key.clone(), task);
        true
    }

    /// Drop both pending phases for `apptid` (cancellation path). Returns
    /// the keys actually removed.
    pub fn remove_appointment(&mut self, apptid: &str) -> Vec<String> {
        [Phase::Before, Phase::After]
            .into_iter()
            .filter_map(|phase| {
                let key = task_key(apptid, phase);
                self.pending.remove(&key).map(|_| key)
            })
            .collect()
    }

    /// Split off every task due at `now`.
    ///
    /// Returns `(due, dropped)`: tasks within the grace window to send now,
    /// and tasks more than `grace` past due, discarded unsent. Both sets are
    /// removed from the pending map before any send is attempted, so a crash
    /// mid-send cannot lead to a duplicate schedule.
    pub fn take_due(
        &mut self,
        now: DateTime<Tz>,
        grace: Duration,
    ) -> (Vec<ScheduledTask>, Vec<ScheduledTask>) {
        let due_keys: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, task)| task.send_time <= now)
            .map(|(key, _)| key.clone())
            .collect();

        let mut due = Vec::new();
        let mut dropped = Vec::new();
        for key in due_keys {
            if let Some(task) = self.pending.remove(&key) {
                if now - task.send_time > grace {
                    dropped.push(task);
                } else {
                    due.push(task);
                }
            }
        }
        due.sort_by_key(|task| task.send_time);
        (due, dropped)
    }

    /// Whether `key` has already been transmitted.
    pub fn already_sent(&self, key: &str) -> bool {
        self.ledger.contains(key)
    }

    /// Whether a task with `key` is waiting to be sent.
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Record a transmitted key in the ledger and persist its partition.
    pub async fn commit_sent(
        &mut self,
        key: &str,
        today: chrono::NaiveDate,
    ) -> Result<(), bookline_core::BooklineError> {
        self.ledger.commit(key, today).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    const TZ: Tz = chrono_tz::Asia::Jerusalem;

    fn at(h: u32, m: u32) -> DateTime<Tz> {
        TZ.with_ymd_and_hms(2026, 8, 20, h, m, 0).unwrap()
    }

    fn task(key: &str, send_time: DateTime<Tz>) -> ScheduledTask {
        ScheduledTask {
            key: key.to_string(),
            msisdn: "0501234567".to_string(),
            message: "hello".to_string(),
            send_time,
        }
    }

    async fn state() -> (DispatchState, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let ledger = SentLedger::load(dir.path(), at(12, 0).date_naive())
            .await
            .unwrap();
        (DispatchState::new(ledger), dir)
    }

    #[test]
    fn task_keys_carry_the_phase() {
        assert_eq!(task_key("421", Phase::Before), "421_before");
        assert_eq!(task_key("421", Phase::After), "421_after");
    }

    #[tokio::test]
    async fn schedule_is_idempotent_per_key() {
        let (mut state, _dir) = state().await;
        assert!(state.schedule(task("1_before", at(10, 0))));
        assert!(!state.schedule(task("1_before", at(11, 0))));
        assert_eq!(state.pending_len(), 1);
    }

    #[tokio::test]
    async fn already_sent_keys_are_not_rescheduled() {
        let (mut state, _dir) = state().await;
        state
            .commit_sent("1_before", at(12, 0).date_naive())
            .await
            .unwrap();
        assert!(!state.schedule(task("1_before", at(10, 0))));
        assert_eq!(state.pending_len(), 0);
    }

    #[tokio::test]
    async fn remove_appointment_drops_both_phases() {
        let (mut state, _dir) = state().await;
        state.schedule(task("7_before", at(10, 0)));
        state.schedule(task("7_after", at(14, 0)));
        state.schedule(task("8_before", at(10, 0)));

        let removed = state.remove_appointment("7");
        assert_eq!(removed.len(), 2);
        assert_eq!(state.pending_len(), 1);
        assert!(state.is_pending("8_before"));
    }

    #[tokio::test]
    async fn take_due_splits_on_the_grace_window() {
        let (mut state, _dir) = state().await;
        let now = at(12, 0);
        // 9 minutes late: within the 10 minute grace, send.
        state.schedule(task("late9_before", at(11, 51)));
        // 11 minutes late: past grace, drop unsent.
        state.schedule(task("late11_before", at(11, 49)));
        // Not yet due.
        state.schedule(task("future_before", at(13, 0)));

        let (due, dropped) = state.take_due(now, Duration::minutes(10));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].key, "late9_before");
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].key, "late11_before");

        // Both were removed from pending; the future task stays.
        assert_eq!(state.pending_len(), 1);
        assert!(state.is_pending("future_before"));
    }

    #[tokio::test]
    async fn take_due_orders_by_send_time() {
        let (mut state, _dir) = state().await;
        state.schedule(task("b_before", at(11, 58)));
        state.schedule(task("a_before", at(11, 55)));

        let (due, _) = state.take_due(at(12, 0), Duration::minutes(10));
        let keys: Vec<&str> = due.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["a_before", "b_before"]);
    }

    #[tokio::test]
    async fn exact_grace_boundary_is_still_sent() {
        let (mut state, _dir) = state().await;
        state.schedule(task("edge_before", at(11, 50)));
        let (due, dropped) = state.take_due(at(12, 0), Duration::minutes(10));
        assert_eq!(due.len(), 1);
        assert!(dropped.is_empty());
    }
}
