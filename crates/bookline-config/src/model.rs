// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Bookline notifier.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level Bookline configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BooklineConfig {
    /// Reminder offsets, dispatch cadence, and debug delivery settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Incremental booking-API poll settings.
    #[serde(default)]
    pub poll: PollConfig,

    /// WhatsApp gateway credentials.
    #[serde(default)]
    pub whatsapp: WhatsappConfig,

    /// Field block-lists applied to inbound appointment events.
    /// Keys are upstream field names, values are rejected field values.
    #[serde(default)]
    pub filters: HashMap<String, Vec<String>>,

    /// Business timezone settings.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Database and ledger file locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Message template bundles, keyed by staff resource name.
    #[serde(default)]
    pub templates: TemplatesConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Reminder offsets, dispatch cadence, and debug delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Redirect every outbound message to `developer_numbers` instead of
    /// the customer. For staging environments.
    #[serde(default)]
    pub debug: bool,

    /// Phone numbers receiving debug-redirected traffic and pipeline
    /// error notifications.
    #[serde(default)]
    pub developer_numbers: Vec<String>,

    /// Hours before the appointment start to send the reminder message.
    #[serde(default = "default_reminder_before_hours")]
    pub reminder_before_hours: f64,

    /// Hours after the appointment end to send the thank-you message.
    #[serde(default = "default_thanks_after_hours")]
    pub thanks_after_hours: f64,

    /// Dispatcher tick period in seconds.
    #[serde(default = "default_dispatch_tick_secs")]
    pub dispatch_tick_secs: u64,

    /// Tasks more than this many seconds past due are dropped unsent.
    #[serde(default = "default_overdue_grace_secs")]
    pub overdue_grace_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            debug: false,
            developer_numbers: Vec::new(),
            reminder_before_hours: default_reminder_before_hours(),
            thanks_after_hours: default_thanks_after_hours(),
            dispatch_tick_secs: default_dispatch_tick_secs(),
            overdue_grace_secs: default_overdue_grace_secs(),
        }
    }
}

fn default_reminder_before_hours() -> f64 {
    24.0
}

fn default_thanks_after_hours() -> f64 {
    2.0
}

fn default_dispatch_tick_secs() -> u64 {
    30
}

fn default_overdue_grace_secs() -> u64 {
    600
}

/// Incremental booking-API poll configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    /// Enable the poll daemon. The webhook path works without it.
    #[serde(default)]
    pub enabled: bool,

    /// Booking API endpoint URL. Required when `enabled`.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Booking API key, sent as the `torkey` header. Required when `enabled`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Poll period in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            api_key: None,
            interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    7200
}

/// WhatsApp gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsappConfig {
    /// Gateway base URL.
    #[serde(default = "default_whatsapp_base_url")]
    pub base_url: String,

    /// Gateway instance id. `None` leaves outbound messaging unconfigured.
    #[serde(default)]
    pub instance_id: Option<String>,

    /// Gateway API token. `None` leaves outbound messaging unconfigured.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for WhatsappConfig {
    fn default() -> Self {
        Self {
            base_url: default_whatsapp_base_url(),
            instance_id: None,
            token: None,
        }
    }
}

fn default_whatsapp_base_url() -> String {
    "https://api.green-api.com".to_string()
}

/// Business timezone configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// IANA timezone name the booking system's timestamps are local to.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

fn default_timezone() -> String {
    "Asia/Jerusalem".to_string()
}

/// Database and ledger file locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite appointments database.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Directory holding the day-partitioned sent-ledger files.
    #[serde(default = "default_ledger_dir")]
    pub ledger_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            ledger_dir: default_ledger_dir(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("bookline").join("bookline.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("bookline.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_ledger_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("bookline").join("sent"))
        .unwrap_or_else(|| std::path::PathBuf::from("sent"))
        .to_string_lossy()
        .into_owned()
}

/// Message template bundles.
///
/// `bundles` is keyed by staff resource name; the `general` bundle is
/// required and serves as the per-field fallback for every other bundle.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TemplatesConfig {
    #[serde(default = "default_bundles")]
    pub bundles: HashMap<String, TemplateBundle>,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            bundles: default_bundles(),
        }
    }
}

/// Name of the fallback bundle every resolution ends at.
pub const GENERAL_BUNDLE: &str = "general";

fn default_bundles() -> HashMap<String, TemplateBundle> {
    let mut bundles = HashMap::new();
    bundles.insert(GENERAL_BUNDLE.to_string(), TemplateBundle::general_defaults());
    bundles
}

/// One named set of message templates.
///
/// Placeholders use `{field}` syntax over the enriched appointment fields
/// (`date_str`, `time_str`, `staffname`, plus every upstream field).
/// The `*_by_client` variants are used when the event was initiated by the
/// customer (`updateby == "99"`); absent variants fall back to the staff
/// wording, and absent fields fall back to the `general` bundle.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateBundle {
    /// Reminder sent before the appointment.
    #[serde(default)]
    pub before: Option<String>,

    /// Thank-you sent after the appointment.
    #[serde(default)]
    pub after: Option<String>,

    /// Confirmation for a newly created appointment.
    #[serde(default)]
    pub create: Option<String>,

    /// Confirmation for a rescheduled appointment.
    #[serde(default)]
    pub update: Option<String>,

    /// Confirmation for a cancelled appointment.
    #[serde(default)]
    pub cancel: Option<String>,

    /// Notice for an expired (auto-removed) appointment.
    #[serde(default)]
    pub expire: Option<String>,

    #[serde(default)]
    pub create_by_client: Option<String>,

    #[serde(default)]
    pub update_by_client: Option<String>,

    #[serde(default)]
    pub cancel_by_client: Option<String>,

    #[serde(default)]
    pub expire_by_client: Option<String>,
}

impl TemplateBundle {
    /// Built-in wording for the `general` bundle.
    pub fn general_defaults() -> Self {
        Self {
            before: Some(
                "Reminder: you have an appointment on {date_str} at {time_str}.".to_string(),
            ),
            after: Some(
                "Thank you for your visit today. We would love to see you again!".to_string(),
            ),
            create: Some(
                "Your appointment on {date_str} at {time_str} has been booked.".to_string(),
            ),
            update: Some(
                "Your appointment has been moved to {date_str} at {time_str}.".to_string(),
            ),
            cancel: Some(
                "Your appointment on {date_str} at {time_str} has been cancelled.".to_string(),
            ),
            expire: Some(
                "Your appointment on {date_str} was removed from the diary.".to_string(),
            ),
            create_by_client: None,
            update_by_client: None,
            cancel_by_client: None,
            expire_by_client: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
