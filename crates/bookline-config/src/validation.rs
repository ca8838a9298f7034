// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: parseable timezones, non-negative offsets, required template
//! bundles, and credential presence for enabled subsystems.

use bookline_core::phone::normalize_msisdn;
use chrono_tz::Tz;

use crate::diagnostic::ConfigError;
use crate::model::{BooklineConfig, GENERAL_BUNDLE};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &BooklineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.schedule.timezone.parse::<Tz>().is_err() {
        errors.push(ConfigError::Validation {
            message: format!(
                "schedule.timezone `{}` is not a known IANA timezone",
                config.schedule.timezone
            ),
        });
    }

    for (key, value) in [
        (
            "delivery.reminder_before_hours",
            config.delivery.reminder_before_hours,
        ),
        (
            "delivery.thanks_after_hours",
            config.delivery.thanks_after_hours,
        ),
    ] {
        if !value.is_finite() || value < 0.0 {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be a non-negative number, got {value}"),
            });
        }
    }

    if config.delivery.dispatch_tick_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "delivery.dispatch_tick_secs must be at least 1".to_string(),
        });
    }

    if config.poll.interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "poll.interval_secs must be at least 1".to_string(),
        });
    }

    if config.delivery.debug && config.delivery.developer_numbers.is_empty() {
        errors.push(ConfigError::Validation {
            message: "delivery.debug is enabled but delivery.developer_numbers is empty"
                .to_string(),
        });
    }

    for number in &config.delivery.developer_numbers {
        if let Err(e) = normalize_msisdn(number) {
            errors.push(ConfigError::Validation {
                message: format!("delivery.developer_numbers entry is unusable: {e}"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.storage.ledger_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.ledger_dir must not be empty".to_string(),
        });
    }

    match config.templates.bundles.get(GENERAL_BUNDLE) {
        None => {
            errors.push(ConfigError::Validation {
                message: format!("templates.bundles must contain a `{GENERAL_BUNDLE}` bundle"),
            });
        }
        Some(general) => {
            if general.before.is_none() {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "templates.bundles.{GENERAL_BUNDLE}.before is required for reminders"
                    ),
                });
            }
            if general.after.is_none() {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "templates.bundles.{GENERAL_BUNDLE}.after is required for thank-you messages"
                    ),
                });
            }
        }
    }

    for (field, values) in &config.filters {
        if field.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "filters contains an empty field name".to_string(),
            });
        }
        if values.is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("filters.{field} has an empty block-list"),
            });
        }
    }

    if config.poll.enabled {
        if config.poll.base_url.as_deref().unwrap_or("").trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "poll.enabled requires poll.base_url".to_string(),
            });
        }
        if config.poll.api_key.as_deref().unwrap_or("").trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "poll.enabled requires poll.api_key".to_string(),
            });
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = BooklineConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn bad_timezone_fails_validation() {
        let mut config = BooklineConfig::default();
        config.schedule.timezone = "Atlantis/Central".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("timezone"))
        ));
    }

    #[test]
    fn negative_offset_fails_validation() {
        let mut config = BooklineConfig::default();
        config.delivery.reminder_before_hours = -2.0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("reminder_before_hours"))
        ));
    }

    #[test]
    fn nan_offset_fails_validation() {
        let mut config = BooklineConfig::default();
        config.delivery.thanks_after_hours = f64::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn debug_without_developers_fails_validation() {
        let mut config = BooklineConfig::default();
        config.delivery.debug = true;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("developer_numbers"))
        ));

        config.delivery.developer_numbers = vec!["0501234567".to_string()];
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn missing_general_bundle_fails_validation() {
        let mut config = BooklineConfig::default();
        config.templates.bundles.clear();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("general"))
        ));
    }

    #[test]
    fn poll_enabled_requires_credentials() {
        let mut config = BooklineConfig::default();
        config.poll.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors
                .iter()
                .filter(|e| matches!(e, ConfigError::Validation { message } if message.contains("poll.")))
                .count(),
            2
        );

        config.poll.base_url = Some("https://booking.example/api".to_string());
        config.poll.api_key = Some("torkey-value".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_multiple_errors() {
        let mut config = BooklineConfig::default();
        config.schedule.timezone = "nope".to_string();
        config.delivery.dispatch_tick_secs = 0;
        config.storage.database_path = String::new();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3);
    }
}
