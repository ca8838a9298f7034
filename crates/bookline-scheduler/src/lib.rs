// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduling core of the Bookline notification service.
//!
//! Turns appointment events (from the webhook path or the poll daemon) into
//! timed one-shot reminder sends: [`NotificationScheduler`] decides what gets
//! scheduled, [`dispatcher`] delivers what is due, [`WebhookHandler`] runs the
//! full webhook pipeline including the dedup gate, and [`TemplateCatalog`]
//! resolves and renders the message wording.

pub mod dispatcher;
pub mod filter;
pub mod scheduler;
pub mod task;
pub mod template;
pub mod webhook;

pub use scheduler::NotificationScheduler;
pub use task::{DispatchState, Phase, ScheduledTask, SharedState, task_key};
pub use template::TemplateCatalog;
pub use webhook::{WebhookHandler, WebhookOutcome};
