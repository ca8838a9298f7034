// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Polling ingress for the Bookline notification service.
//!
//! For deployments where the booking platform cannot push webhooks, this
//! crate pulls incremental appointment exports instead: [`PollClient`] talks
//! to the platform's export endpoint and [`daemon::run`] drives it on an
//! interval, feeding batches into the same pipeline the webhook path uses.

pub mod client;
pub mod daemon;

pub use client::PollClient;
pub use daemon::{BatchHandler, poll_window};
