// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The outbound messaging seam.

use async_trait::async_trait;

use crate::error::BooklineError;

/// Delivers rendered notification text to a customer phone number.
///
/// Implementations normalize the number themselves; callers may pass it in
/// any shape the booking system produced. Send failures surface as
/// [`BooklineError::Channel`] and are never retried by the pipeline.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, msisdn: &str, text: &str) -> Result<(), BooklineError>;
}
