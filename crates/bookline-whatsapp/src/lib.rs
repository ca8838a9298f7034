// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp delivery channel for the Bookline notification service.
//!
//! Implements [`bookline_core::Messenger`] against the Green API gateway:
//! text messages via `sendMessage` and file attachments via
//! `sendFileByUpload`. Recipient numbers are normalized to international
//! form before every call.

pub mod client;

pub use client::WaClient;
