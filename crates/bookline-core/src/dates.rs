// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Date parsing and timezone localization for appointment timestamps.
//!
//! The booking system emits two fixed formats: webhooks carry
//! `DD/MM/YYYY HH:MM:SS` (sometimes with JSON-escaped slashes), the poll
//! API carries compact `YYYYMMDDHHMM`. All timestamps are naive wall-clock
//! times in the business's local timezone.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::error::BooklineError;

/// Webhook timestamp format, e.g. `21/08/2026 14:30:00`.
pub const WEBHOOK_DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Poll API timestamp format, e.g. `202608211430`.
pub const COMPACT_DATETIME_FORMAT: &str = "%Y%m%d%H%M";

/// Compact date format used for poll window bounds, e.g. `20260821`.
pub const COMPACT_DATE_FORMAT: &str = "%Y%m%d";

/// Display date inserted into message templates.
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

/// Display time inserted into message templates.
pub const DISPLAY_TIME_FORMAT: &str = "%H:%M";

/// Remove JSON slash escaping and surrounding whitespace from a raw
/// timestamp. Some upstream webhook senders deliver `21\/08\/2026 ...`.
pub fn clean_date_str(raw: &str) -> String {
    raw.replace("\\/", "/").trim().to_string()
}

/// Parse a webhook-format timestamp strictly.
pub fn parse_webhook_datetime(raw: &str) -> Result<NaiveDateTime, BooklineError> {
    let cleaned = clean_date_str(raw);
    NaiveDateTime::parse_from_str(&cleaned, WEBHOOK_DATETIME_FORMAT).map_err(|e| {
        BooklineError::Validation(format!("timestamp `{raw}` is not DD/MM/YYYY HH:MM:SS: {e}"))
    })
}

/// Parse an appointment timestamp from either source format.
///
/// Tries the webhook format first, then the compact poll format.
pub fn parse_appointment_datetime(raw: &str) -> Result<NaiveDateTime, BooklineError> {
    let cleaned = clean_date_str(raw);
    NaiveDateTime::parse_from_str(&cleaned, WEBHOOK_DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(&cleaned, COMPACT_DATETIME_FORMAT))
        .map_err(|_| {
            BooklineError::Validation(format!(
                "timestamp `{raw}` matches neither DD/MM/YYYY HH:MM:SS nor YYYYMMDDHHMM"
            ))
        })
}

/// Attach the business timezone to a naive appointment time.
///
/// Ambiguous wall times (DST fold) take the earlier offset. Times inside a
/// DST gap are shifted forward one hour to the next valid wall time. Both
/// cases are total: a reminder must never be lost to an offset transition.
pub fn localize(naive: NaiveDateTime, tz: Tz) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earlier, _) => earlier,
        LocalResult::None => {
            let shifted = naive + Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) => dt,
                LocalResult::Ambiguous(earlier, _) => earlier,
                LocalResult::None => tz.from_utc_datetime(&naive),
            }
        }
    }
}

/// Convert a fractional hour count from configuration into a duration.
pub fn hours_f64(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn parses_webhook_format() {
        let dt = parse_webhook_datetime("21/08/2026 14:30:00").unwrap();
        assert_eq!(
            dt,
            NaiveDate::from_ymd_opt(2026, 8, 21)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn cleans_escaped_slashes() {
        let dt = parse_webhook_datetime(r"21\/08\/2026 14:30:00").unwrap();
        assert_eq!(dt.format(DISPLAY_DATE_FORMAT).to_string(), "21/08/2026");
    }

    #[test]
    fn parses_compact_format() {
        let dt = parse_appointment_datetime("202608211430").unwrap();
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_webhook_datetime("soon").is_err());
        assert!(parse_appointment_datetime("2026-08-21 14:30").is_err());
    }

    #[test]
    fn localize_normal_time() {
        let tz: Tz = "Asia/Jerusalem".parse().unwrap();
        let naive = NaiveDate::from_ymd_opt(2026, 1, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let dt = localize(naive, tz);
        assert_eq!(dt.naive_local(), naive);
    }

    #[test]
    fn localize_dst_gap_shifts_forward() {
        // Israel springs forward at 02:00 on the last Friday of March;
        // 02:30 local does not exist on 2026-03-27.
        let tz: Tz = "Asia/Jerusalem".parse().unwrap();
        let naive = NaiveDate::from_ymd_opt(2026, 3, 27)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let dt = localize(naive, tz);
        assert!(dt.naive_local() > naive);
    }

    #[test]
    fn fractional_hours() {
        assert_eq!(hours_f64(1.5), Duration::minutes(90));
        assert_eq!(hours_f64(0.25), Duration::minutes(15));
    }
}
