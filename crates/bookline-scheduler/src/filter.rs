// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound event filtering.
//!
//! Three gates run before any scheduling work: the upstream "temporary hold"
//! status, the configured field block-lists, and reservation-expiry noise
//! (updates carrying a truthy `tmp_expire_date`).

use std::collections::HashMap;

use bookline_core::types::{Action, Appointment, value_truthy};

/// Why an event was dropped before processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// `status == "5"`: a temporary hold, not a real booking yet.
    TemporaryHold,
    /// A configured block-list matched `field` with the given value.
    Blocked { field: String, value: String },
    /// An update event carrying a truthy `tmp_expire_date`.
    ExpiryNoise,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::TemporaryHold => write!(f, "temporary hold (status 5)"),
            DropReason::Blocked { field, value } => {
                write!(f, "blocked value `{value}` in field `{field}`")
            }
            DropReason::ExpiryNoise => write!(f, "update with tmp_expire_date set"),
        }
    }
}

/// Evaluate every filter gate against one appointment event.
///
/// `filters` maps upstream field names to their blocked values. Returns the
/// first matching reason, or `None` when the event should be processed.
pub fn evaluate(
    appt: &Appointment,
    filters: &HashMap<String, Vec<String>>,
) -> Option<DropReason> {
    if appt.status.as_deref().map(str::trim) == Some("5") {
        return Some(DropReason::TemporaryHold);
    }

    for (field, blocked) in filters {
        if let Some(value) = appt.field(field)
            && blocked.contains(&value)
        {
            return Some(DropReason::Blocked {
                field: field.clone(),
                value,
            });
        }
    }

    let is_update = appt
        .action
        .as_deref()
        .and_then(Action::from_code)
        .is_some_and(|a| a == Action::Update);
    if is_update && appt.tmp_expire_date.as_ref().is_some_and(value_truthy) {
        return Some(DropReason::ExpiryNoise);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn appt(extra: serde_json::Value) -> Appointment {
        let mut base = json!({
            "apptid": "100",
            "From_date": "21/08/2026 14:30:00",
        });
        base.as_object_mut()
            .unwrap()
            .extend(extra.as_object().unwrap().clone());
        serde_json::from_value(base).unwrap()
    }

    fn no_filters() -> HashMap<String, Vec<String>> {
        HashMap::new()
    }

    #[test]
    fn plain_event_passes() {
        assert_eq!(evaluate(&appt(json!({})), &no_filters()), None);
    }

    #[test]
    fn status_five_is_a_temporary_hold() {
        let a = appt(json!({"status": "5"}));
        assert_eq!(evaluate(&a, &no_filters()), Some(DropReason::TemporaryHold));

        // Numeric status arrives too.
        let a = appt(json!({"status": 5}));
        assert_eq!(evaluate(&a, &no_filters()), Some(DropReason::TemporaryHold));

        let a = appt(json!({"status": "1"}));
        assert_eq!(evaluate(&a, &no_filters()), None);
    }

    #[test]
    fn block_list_matches_typed_and_extra_fields() {
        let mut filters = HashMap::new();
        filters.insert("staffname".to_string(), vec!["Storage Room".to_string()]);
        filters.insert("servicename".to_string(), vec!["Internal".to_string()]);

        let a = appt(json!({"staffname": "Storage Room"}));
        assert!(matches!(
            evaluate(&a, &filters),
            Some(DropReason::Blocked { .. })
        ));

        let a = appt(json!({"servicename": "Internal"}));
        assert!(matches!(
            evaluate(&a, &filters),
            Some(DropReason::Blocked { .. })
        ));

        let a = appt(json!({"staffname": "Room 2", "servicename": "Massage"}));
        assert_eq!(evaluate(&a, &filters), None);
    }

    #[test]
    fn update_with_tmp_expire_date_is_noise() {
        let a = appt(json!({"action": "2", "tmp_expire_date": "2026-09-01"}));
        assert_eq!(evaluate(&a, &no_filters()), Some(DropReason::ExpiryNoise));

        // Falsy values do not trigger the gate.
        let a = appt(json!({"action": "2", "tmp_expire_date": ""}));
        assert_eq!(evaluate(&a, &no_filters()), None);
        let a = appt(json!({"action": "2", "tmp_expire_date": null}));
        assert_eq!(evaluate(&a, &no_filters()), None);

        // Only updates are affected.
        let a = appt(json!({"action": "1", "tmp_expire_date": "2026-09-01"}));
        assert_eq!(evaluate(&a, &no_filters()), None);
    }
}
