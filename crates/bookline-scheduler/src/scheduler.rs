// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns appointment events into pending reminder tasks.
//!
//! [`NotificationScheduler::handle_new_appointments`] is the single entry
//! point for both ingress paths: the poll daemon feeds it raw batches, the
//! webhook handler feeds it one already-vetted event at a time. Every
//! per-item failure is logged and skipped; a bad appointment never takes the
//! rest of its batch down.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use bookline_config::ConfigHandle;
use bookline_core::dates::{
    DISPLAY_DATE_FORMAT, DISPLAY_TIME_FORMAT, hours_f64, localize, parse_appointment_datetime,
};
use bookline_core::types::{Action, Appointment};
use bookline_core::BooklineError;
use bookline_poller::BatchHandler;

use crate::filter;
use crate::task::{Phase, ScheduledTask, SharedState, task_key};
use crate::template::{TemplateCatalog, render};

/// Decides delivery policy for appointment events and maintains the pending
/// task map.
pub struct NotificationScheduler {
    config: ConfigHandle,
    state: SharedState,
}

impl NotificationScheduler {
    pub fn new(config: ConfigHandle, state: SharedState) -> Self {
        Self { config, state }
    }

    /// The shared dispatch state this scheduler feeds.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// The business timezone from the current config snapshot.
    ///
    /// Validation rejects unknown zones at load time; if a hot reload slips
    /// one through anyway we fall back to the default rather than dropping
    /// reminders.
    fn timezone(&self) -> Tz {
        let name = &self.config.current().schedule.timezone;
        name.parse().unwrap_or_else(|_| {
            warn!(timezone = %name, "unparseable business timezone, using Asia/Jerusalem");
            chrono_tz::Asia::Jerusalem
        })
    }

    /// Process one batch of raw appointment objects.
    pub async fn handle_new_appointments(&self, batch: Vec<serde_json::Value>) {
        info!(count = batch.len(), "processing appointment batch");
        for raw in batch {
            let appt: Appointment = match serde_json::from_value(raw) {
                Ok(appt) => appt,
                Err(e) => {
                    warn!(error = %e, "skipping undeserializable appointment event");
                    continue;
                }
            };
            if let Err(e) = self.handle_one(&appt).await {
                warn!(apptid = %appt.apptid, error = %e, "skipping appointment event");
            }
        }
    }

    async fn handle_one(&self, appt: &Appointment) -> Result<(), BooklineError> {
        let config = self.config.current();

        if let Some(reason) = filter::evaluate(appt, &config.filters) {
            info!(apptid = %appt.apptid, %reason, "appointment event filtered");
            return Ok(());
        }

        let removed = appt
            .action
            .as_deref()
            .and_then(Action::from_code)
            .is_some_and(Action::is_removal);
        if appt.cancelled || removed {
            let keys = self.state.lock().await.remove_appointment(&appt.apptid);
            info!(apptid = %appt.apptid, removed = keys.len(), "cancelled appointment, pending reminders removed");
            return Ok(());
        }

        self.schedule_reminders(appt).await
    }

    /// Create the before/after reminder tasks for a live appointment,
    /// skipping any phase already pending or already sent.
    pub async fn schedule_reminders(&self, appt: &Appointment) -> Result<(), BooklineError> {
        let config = self.config.current();
        let tz = self.timezone();

        let from_dt = localize(parse_appointment_datetime(&appt.from_date)?, tz);
        let to_dt = match &appt.to_date {
            Some(raw) => localize(parse_appointment_datetime(raw)?, tz),
            None => from_dt,
        };

        let msisdn = appt
            .cell
            .clone()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                BooklineError::Validation("appointment has no destination number".to_string())
            })?;

        let fields = enrich(appt, from_dt.naive_local(), to_dt.naive_local());
        let catalog = TemplateCatalog::new(&config.templates);
        let staff = appt.staff();

        let before_time = from_dt - hours_f64(config.delivery.reminder_before_hours);
        let after_time = to_dt + hours_f64(config.delivery.thanks_after_hours);

        let mut tasks = Vec::with_capacity(2);
        for (phase, send_time) in [(Phase::Before, before_time), (Phase::After, after_time)] {
            let message = render(catalog.reminder(staff, phase)?, &fields)?;
            tasks.push(ScheduledTask {
                key: task_key(&appt.apptid, phase),
                msisdn: msisdn.clone(),
                message,
                send_time,
            });
        }

        let mut state = self.state.lock().await;
        for task in tasks {
            let key = task.key.clone();
            let send_time = task.send_time;
            if state.schedule(task) {
                debug!(key = %key, send_time = %send_time, "reminder scheduled");
            } else {
                debug!(key = %key, "reminder already pending or sent, not rescheduled");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BatchHandler for NotificationScheduler {
    async fn handle_batch(&self, batch: Vec<serde_json::Value>) {
        self.handle_new_appointments(batch).await;
    }
}

/// Build the template substitution map for one appointment.
///
/// Every upstream field is available under its canonical name, plus the
/// derived `date_str` / `time_str` display strings and the trimmed
/// `staffname`.
pub fn enrich(
    appt: &Appointment,
    from_local: chrono::NaiveDateTime,
    to_local: chrono::NaiveDateTime,
) -> HashMap<String, String> {
    let mut fields = appt.field_map();
    fields.insert(
        "date_str".to_string(),
        from_local.format(DISPLAY_DATE_FORMAT).to_string(),
    );
    fields.insert(
        "time_str".to_string(),
        from_local.format(DISPLAY_TIME_FORMAT).to_string(),
    );
    fields.insert(
        "end_time_str".to_string(),
        to_local.format(DISPLAY_TIME_FORMAT).to_string(),
    );
    fields.insert("staffname".to_string(), appt.staff().to_string());
    fields
}
