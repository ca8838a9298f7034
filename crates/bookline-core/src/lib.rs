// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Bookline notification pipeline.
//!
//! This crate provides the error type, the canonical appointment event
//! model, phone and date helpers, and the outbound messaging trait used
//! throughout the Bookline workspace.

pub mod dates;
pub mod error;
pub mod phone;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::BooklineError;
pub use traits::Messenger;
pub use types::{Action, Appointment};
