// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch loop: delivers due tasks and commits them to the ledger.
//!
//! One active loop per process. Each tick snapshots what is due, drops what
//! is past the overdue grace window, removes the remainder from the pending
//! map, and only then attempts the sends. A failed send is logged and lost;
//! a successful one is committed to the sent ledger before the next tick.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use bookline_config::ConfigHandle;
use bookline_config::model::DeliveryConfig;
use bookline_core::{BooklineError, Messenger};

use crate::task::SharedState;

/// Send `text` to the recipients the delivery policy selects.
///
/// In debug mode every message goes to the developer numbers instead of the
/// customer. The first failure aborts the remaining recipients and surfaces.
pub async fn deliver(
    messenger: &dyn Messenger,
    delivery: &DeliveryConfig,
    msisdn: &str,
    text: &str,
) -> Result<(), BooklineError> {
    if delivery.debug {
        for number in &delivery.developer_numbers {
            messenger.send_message(number, text).await?;
        }
        Ok(())
    } else {
        messenger.send_message(msisdn, text).await
    }
}

/// Run one dispatch tick at `now`. Returns the number of tasks transmitted.
pub async fn dispatch_once(
    state: &SharedState,
    config: &ConfigHandle,
    messenger: &dyn Messenger,
    now: DateTime<Tz>,
) -> usize {
    let config = config.current();
    let grace = Duration::seconds(config.delivery.overdue_grace_secs as i64);

    let (due, dropped) = state.lock().await.take_due(now, grace);
    for task in &dropped {
        info!(key = %task.key, send_time = %task.send_time, "ignoring overdue task");
    }

    let mut sent = 0usize;
    for task in due {
        match deliver(messenger, &config.delivery, &task.msisdn, &task.message).await {
            Ok(()) => {
                if let Err(e) = state
                    .lock()
                    .await
                    .commit_sent(&task.key, now.date_naive())
                    .await
                {
                    // The message went out; a missed commit only risks one
                    // extra delivery after a restart.
                    error!(key = %task.key, error = %e, "sent but failed to commit to ledger");
                }
                sent += 1;
                debug!(key = %task.key, "notification sent");
            }
            Err(e) => {
                // Already out of pending: this notification is lost.
                error!(key = %task.key, error = %e, "send failed, task dropped");
            }
        }
    }
    sent
}

fn timezone(config: &ConfigHandle) -> Tz {
    let name = &config.current().schedule.timezone;
    name.parse().unwrap_or_else(|_| {
        warn!(timezone = %name, "unparseable business timezone, using Asia/Jerusalem");
        chrono_tz::Asia::Jerusalem
    })
}

/// Run the dispatch loop until `cancel` fires.
pub async fn run(
    state: SharedState,
    config: ConfigHandle,
    messenger: Arc<dyn Messenger>,
    cancel: CancellationToken,
) {
    let tick = std::time::Duration::from_secs(config.current().delivery.dispatch_tick_secs);
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now().with_timezone(&timezone(&config));
                let sent = dispatch_once(&state, &config, messenger.as_ref(), now).await;
                if sent > 0 {
                    info!(sent, "dispatch tick complete");
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
    debug!("dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use tempfile::tempdir;

    use bookline_config::model::BooklineConfig;
    use bookline_storage::SentLedger;

    use crate::task::{DispatchState, ScheduledTask};

    const TZ: Tz = chrono_tz::Asia::Jerusalem;

    struct FakeMessenger {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl FakeMessenger {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn recipients(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
        }
    }

    #[async_trait]
    impl Messenger for FakeMessenger {
        async fn send_message(&self, msisdn: &str, text: &str) -> Result<(), BooklineError> {
            if self.fail {
                return Err(BooklineError::Channel {
                    message: "gateway offline".to_string(),
                    source: None,
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((msisdn.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Tz> {
        TZ.with_ymd_and_hms(2026, 8, 20, h, m, 0).unwrap()
    }

    fn task(key: &str, send_time: DateTime<Tz>) -> ScheduledTask {
        ScheduledTask {
            key: key.to_string(),
            msisdn: "0501234567".to_string(),
            message: format!("msg {key}"),
            send_time,
        }
    }

    async fn shared_state() -> (SharedState, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let ledger = SentLedger::load(dir.path(), at(12, 0).date_naive())
            .await
            .unwrap();
        (DispatchState::shared(ledger), dir)
    }

    #[tokio::test]
    async fn due_task_is_sent_and_committed() {
        let (state, _dir) = shared_state().await;
        state.lock().await.schedule(task("5_before", at(11, 55)));

        let config = ConfigHandle::new(BooklineConfig::default());
        let messenger = FakeMessenger::new();
        let sent = dispatch_once(&state, &config, &messenger, at(12, 0)).await;

        assert_eq!(sent, 1);
        assert_eq!(messenger.recipients(), vec!["0501234567"]);
        let state = state.lock().await;
        assert!(state.already_sent("5_before"));
        assert_eq!(state.pending_len(), 0);
    }

    #[tokio::test]
    async fn overdue_task_is_dropped_unsent() {
        let (state, _dir) = shared_state().await;
        // 11 minutes past due: beyond the 600 s grace.
        state.lock().await.schedule(task("old_before", at(11, 49)));
        // 9 minutes past due: still sendable.
        state.lock().await.schedule(task("fresh_before", at(11, 51)));

        let config = ConfigHandle::new(BooklineConfig::default());
        let messenger = FakeMessenger::new();
        let sent = dispatch_once(&state, &config, &messenger, at(12, 0)).await;

        assert_eq!(sent, 1);
        let messages: Vec<String> = messenger
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect();
        assert_eq!(messages, vec!["msg fresh_before"]);

        let state = state.lock().await;
        assert!(!state.already_sent("old_before"));
        assert_eq!(state.pending_len(), 0);
    }

    #[tokio::test]
    async fn failed_send_is_lost_not_retried() {
        let (state, _dir) = shared_state().await;
        state.lock().await.schedule(task("9_after", at(11, 58)));

        let config = ConfigHandle::new(BooklineConfig::default());
        let messenger = FakeMessenger::failing();
        let sent = dispatch_once(&state, &config, &messenger, at(12, 0)).await;

        assert_eq!(sent, 0);
        let state = state.lock().await;
        // Out of pending (no retry) and not in the ledger (never sent).
        assert_eq!(state.pending_len(), 0);
        assert!(!state.already_sent("9_after"));
    }

    #[tokio::test]
    async fn future_task_stays_pending() {
        let (state, _dir) = shared_state().await;
        state.lock().await.schedule(task("f_before", at(15, 0)));

        let config = ConfigHandle::new(BooklineConfig::default());
        let messenger = FakeMessenger::new();
        let sent = dispatch_once(&state, &config, &messenger, at(12, 0)).await;

        assert_eq!(sent, 0);
        assert_eq!(state.lock().await.pending_len(), 1);
    }

    #[tokio::test]
    async fn debug_mode_redirects_to_developers() {
        let (state, _dir) = shared_state().await;
        state.lock().await.schedule(task("d_before", at(11, 59)));

        let mut config = BooklineConfig::default();
        config.delivery.debug = true;
        config.delivery.developer_numbers =
            vec!["972500000001".to_string(), "972500000002".to_string()];
        let config = ConfigHandle::new(config);

        let messenger = FakeMessenger::new();
        dispatch_once(&state, &config, &messenger, at(12, 0)).await;

        assert_eq!(
            messenger.recipients(),
            vec!["972500000001", "972500000002"]
        );
    }

    #[tokio::test]
    async fn run_loop_dispatches_and_stops_on_cancel() {
        let (state, _dir) = shared_state().await;
        state.lock().await.schedule(task("loop_before", at(0, 0)));

        let mut config = BooklineConfig::default();
        config.delivery.dispatch_tick_secs = 1;
        // Send times in the past relative to the real clock would be dropped
        // as overdue, so widen the grace window for this test.
        config.delivery.overdue_grace_secs = u32::MAX as u64;
        let config = ConfigHandle::new(config);

        let messenger = Arc::new(FakeMessenger::new());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            state.clone(),
            config,
            messenger.clone(),
            cancel.clone(),
        ));

        let mut delivered = false;
        for _ in 0..50 {
            if !messenger.recipients().is_empty() {
                delivered = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        cancel.cancel();
        handle.await.unwrap();
        assert!(delivered, "dispatch loop never sent the due task");
    }
}
