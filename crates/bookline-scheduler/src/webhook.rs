// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The webhook pipeline: dedup gate, confirmation send, reminder scheduling.
//!
//! The HTTP framework is out of scope; [`WebhookHandler::handle`] takes an
//! already-parsed payload. Create/update events pass through the appointment
//! dedup store and short-circuit when the fingerprint is unchanged.
//! Cancel/expire events bypass the gate: they must always remove pending
//! reminders, even when the stored row looks identical.

use std::sync::Arc;

use tracing::{error, info, warn};

use bookline_config::ConfigHandle;
use bookline_core::dates::{localize, parse_webhook_datetime};
use bookline_core::types::{Action, Appointment};
use bookline_core::{BooklineError, Messenger};
use bookline_storage::{AppointmentRecord, Database, appointments};

use crate::dispatcher::deliver;
use crate::filter;
use crate::scheduler::{NotificationScheduler, enrich};
use crate::template::{TemplateCatalog, render};

/// What the pipeline decided about one webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A new or changed appointment: confirmation sent, reminders scheduled.
    Processed,
    /// Dropped by a filter gate before any work.
    Filtered,
    /// Fingerprint unchanged in the store; nothing re-sent or rescheduled.
    Duplicate,
    /// A cancel/expire event; pending reminders removed.
    Removed,
}

/// Processes inbound booking webhooks end to end.
pub struct WebhookHandler {
    config: ConfigHandle,
    db: Arc<Database>,
    scheduler: Arc<NotificationScheduler>,
    messenger: Arc<dyn Messenger>,
}

impl WebhookHandler {
    pub fn new(
        config: ConfigHandle,
        db: Arc<Database>,
        scheduler: Arc<NotificationScheduler>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            config,
            db,
            scheduler,
            messenger,
        }
    }

    /// Run the pipeline for one webhook payload.
    ///
    /// On a processing error the developer numbers are notified best-effort
    /// and the error is returned to the caller.
    pub async fn handle(&self, payload: serde_json::Value) -> Result<WebhookOutcome, BooklineError> {
        match self.process(payload).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(error = %e, "webhook processing failed");
                self.notify_developers(&format!("webhook error: {e}")).await;
                Err(e)
            }
        }
    }

    async fn process(&self, payload: serde_json::Value) -> Result<WebhookOutcome, BooklineError> {
        let appt: Appointment = serde_json::from_value(payload)
            .map_err(|e| BooklineError::Validation(format!("unusable webhook payload: {e}")))?;

        let action = appt
            .action
            .as_deref()
            .and_then(Action::from_code)
            .ok_or_else(|| {
                BooklineError::Validation(format!(
                    "unknown webhook action `{}`",
                    appt.action.as_deref().unwrap_or("")
                ))
            })?;

        let config = self.config.current();
        if let Some(reason) = filter::evaluate(&appt, &config.filters) {
            info!(apptid = %appt.apptid, %reason, "webhook filtered");
            return Ok(WebhookOutcome::Filtered);
        }

        let record = AppointmentRecord {
            apptid: appt.apptid.clone(),
            from_date: appt.from_date.clone(),
            staffname: appt.staff().to_string(),
        };

        if action.is_removal() {
            // Record the revision but never let the dedup result (or a lock
            // timeout) stop the removal of pending reminders.
            if let Err(e) = appointments::try_upsert(&self.db, &record).await {
                warn!(apptid = %appt.apptid, error = %e, "store update failed on removal event");
            }
            let removed = self
                .scheduler
                .state()
                .lock()
                .await
                .remove_appointment(&appt.apptid);
            info!(apptid = %appt.apptid, %action, removed = removed.len(), "appointment removed");

            self.send_confirmation(&appt, action).await?;
            return Ok(WebhookOutcome::Removed);
        }

        let changed = appointments::try_upsert(&self.db, &record).await?;
        if !changed {
            info!(apptid = %appt.apptid, "webhook duplicate, fingerprint unchanged");
            return Ok(WebhookOutcome::Duplicate);
        }

        self.send_confirmation(&appt, action).await?;
        self.scheduler.schedule_reminders(&appt).await?;
        info!(apptid = %appt.apptid, %action, "webhook processed");
        Ok(WebhookOutcome::Processed)
    }

    /// Render and deliver the immediate action confirmation.
    async fn send_confirmation(
        &self,
        appt: &Appointment,
        action: Action,
    ) -> Result<(), BooklineError> {
        let Some(msisdn) = appt.cell.clone().filter(|c| !c.trim().is_empty()) else {
            warn!(apptid = %appt.apptid, "no destination number, confirmation skipped");
            return Ok(());
        };

        let config = self.config.current();
        let tz = config
            .schedule
            .timezone
            .parse()
            .unwrap_or(chrono_tz::Asia::Jerusalem);
        let from_dt = localize(parse_webhook_datetime(&appt.from_date)?, tz);
        let to_dt = match &appt.to_date {
            Some(raw) => localize(parse_webhook_datetime(raw)?, tz),
            None => from_dt,
        };

        let fields = enrich(appt, from_dt.naive_local(), to_dt.naive_local());
        let catalog = TemplateCatalog::new(&config.templates);
        let template = catalog.confirmation(appt.staff(), action, appt.by_client())?;
        let message = render(template, &fields)?;

        deliver(self.messenger.as_ref(), &config.delivery, &msisdn, &message).await
    }

    /// Best-effort error notification to the developer numbers.
    async fn notify_developers(&self, text: &str) {
        let config = self.config.current();
        for number in &config.delivery.developer_numbers {
            if let Err(e) = self.messenger.send_message(number, text).await {
                warn!(error = %e, "failed to notify developer number");
            }
        }
    }
}
