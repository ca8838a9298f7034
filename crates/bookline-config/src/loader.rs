// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./bookline.toml` > `~/.config/bookline/bookline.toml`
//! > `/etc/bookline/bookline.toml` with environment variable overrides via the
//! `BOOKLINE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::BooklineConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/bookline/bookline.toml` (system-wide)
/// 3. `~/.config/bookline/bookline.toml` (user XDG config)
/// 4. `./bookline.toml` (local directory)
/// 5. `BOOKLINE_*` environment variables
pub fn load_config() -> Result<BooklineConfig, figment::Error> {
    load_config_with(None)
}

/// Load configuration with an optional extra TOML file layered on top of
/// the hierarchy (used for the `--config` flag). Environment variables
/// still override the extra file.
pub fn load_config_with(extra: Option<&Path>) -> Result<BooklineConfig, figment::Error> {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(BooklineConfig::default()))
        .merge(Toml::file("/etc/bookline/bookline.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("bookline/bookline.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("bookline.toml"));
    if let Some(path) = extra {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider()).extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<BooklineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BooklineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// CRITICAL: Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity
/// with underscore-containing key names. For example,
/// `BOOKLINE_DELIVERY_REMINDER_BEFORE_HOURS` must map to
/// `delivery.reminder_before_hours`, not `delivery.reminder.before.hours`.
fn env_provider() -> Env {
    Env::prefixed("BOOKLINE_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: BOOKLINE_DELIVERY_DEBUG -> "delivery_debug"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("delivery_", "delivery.", 1)
            .replacen("poll_", "poll.", 1)
            .replacen("whatsapp_", "whatsapp.", 1)
            .replacen("schedule_", "schedule.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("log_", "log.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_extract() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.delivery.reminder_before_hours, 24.0);
        assert_eq!(config.delivery.dispatch_tick_secs, 30);
        assert_eq!(config.poll.interval_secs, 7200);
        assert_eq!(config.schedule.timezone, "Asia/Jerusalem");
        assert!(!config.delivery.debug);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
[delivery]
reminder_before_hours = 48.0
developer_numbers = ["0501234567"]

[poll]
enabled = true
base_url = "https://booking.example/api"
api_key = "k1"
"#,
        )
        .unwrap();
        assert_eq!(config.delivery.reminder_before_hours, 48.0);
        assert!(config.poll.enabled);
        assert_eq!(
            config.poll.base_url.as_deref(),
            Some("https://booking.example/api")
        );
    }

    #[test]
    fn filters_section_is_a_free_form_map() {
        let config = load_config_from_str(
            r#"
[filters]
status = ["9"]
servicename = ["Internal", "Blocked"]
"#,
        )
        .unwrap();
        assert_eq!(config.filters["status"], vec!["9"]);
        assert_eq!(config.filters["servicename"].len(), 2);
    }

    #[test]
    fn template_bundles_merge_with_general_default() {
        let config = load_config_from_str(
            r#"
[templates.bundles."Room 2"]
before = "Room 2 reminder for {date_str}"
"#,
        )
        .unwrap();
        assert!(config.templates.bundles.contains_key("general"));
        assert!(config.templates.bundles.contains_key("Room 2"));
        assert!(config.templates.bundles["Room 2"].after.is_none());
    }

    #[test]
    #[serial_test::serial]
    fn env_vars_override_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "bookline.toml",
                r#"
[delivery]
reminder_before_hours = 10.0
"#,
            )?;
            jail.set_env("BOOKLINE_DELIVERY_REMINDER_BEFORE_HOURS", "3.5");
            jail.set_env("BOOKLINE_SCHEDULE_TIMEZONE", "Europe/London");
            let config = load_config().expect("config should load");
            assert_eq!(config.delivery.reminder_before_hours, 3.5);
            assert_eq!(config.schedule.timezone, "Europe/London");
            Ok(())
        });
    }
}
