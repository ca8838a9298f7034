// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone number normalization for WhatsApp delivery.
//!
//! The booking system hands us numbers in whatever shape the receptionist
//! typed them: `050-123 4567`, `+972501234567`, `00972501234567`. All of
//! them must collapse to the same international digit string before the
//! gateway sees them.

use crate::error::BooklineError;

/// Country prefix applied to local-form numbers.
const LOCAL_COUNTRY_PREFIX: &str = "972";

/// Minimum digit count for a deliverable number after normalization.
const MIN_DIGITS: usize = 8;

/// Normalize a raw phone number to international digits.
///
/// Rules, applied in order:
/// 1. Strip every non-digit character.
/// 2. Strip a leading `00` international-dial prefix.
/// 3. Rewrite a 10-digit local number starting with `0` to `972` + rest.
/// 4. Reject anything shorter than 8 digits.
pub fn normalize_msisdn(raw: &str) -> Result<String, BooklineError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let digits = match digits.strip_prefix("00") {
        Some(rest) => rest.to_string(),
        None => digits,
    };

    let digits = if digits.len() == 10 && digits.starts_with('0') {
        format!("{LOCAL_COUNTRY_PREFIX}{}", &digits[1..])
    } else {
        digits
    };

    if digits.len() < MIN_DIGITS {
        return Err(BooklineError::Validation(format!(
            "phone number `{raw}` has too few digits after normalization"
        )));
    }

    Ok(digits)
}

/// Format a normalized number as a WhatsApp chat id.
pub fn chat_id(msisdn: &str) -> String {
    format!("{msisdn}@c.us")
}
