// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `bookline check` command implementation.
//!
//! The configuration was already loaded and validated by `main`; this just
//! reports what the service would run with.

use bookline_config::model::BooklineConfig;

/// Print a summary of the effective configuration.
pub fn run_check(config: &BooklineConfig) {
    println!("configuration OK");
    println!("  timezone:          {}", config.schedule.timezone);
    println!(
        "  reminder offsets:  -{}h / +{}h",
        config.delivery.reminder_before_hours, config.delivery.thanks_after_hours
    );
    println!(
        "  dispatch tick:     {}s (grace {}s)",
        config.delivery.dispatch_tick_secs, config.delivery.overdue_grace_secs
    );
    println!("  database:          {}", config.storage.database_path);
    println!("  ledger dir:        {}", config.storage.ledger_dir);
    println!(
        "  poll:              {}",
        if config.poll.enabled {
            format!("enabled, every {}s", config.poll.interval_secs)
        } else {
            "disabled".to_string()
        }
    );
    println!(
        "  whatsapp:          {}",
        if config.whatsapp.instance_id.is_some() && config.whatsapp.token.is_some() {
            "configured"
        } else {
            "not configured"
        }
    );
    println!(
        "  template bundles:  {}",
        config.templates.bundles.len()
    );
    println!(
        "  debug delivery:    {}",
        if config.delivery.debug {
            format!("ON ({} developer numbers)", config.delivery.developer_numbers.len())
        } else {
            "off".to_string()
        }
    );
}
