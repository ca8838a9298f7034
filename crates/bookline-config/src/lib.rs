// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Bookline notification service.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, environment variable overrides, Elm-style diagnostic
//! error rendering with typo suggestions, and hot reload of the running snapshot.
//!
//! # Usage
//!
//! ```no_run
//! use bookline_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Timezone: {}", config.schedule.timezone);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;
pub mod watch;

use std::path::{Path, PathBuf};

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_str, load_config_with};
pub use model::{BooklineConfig, GENERAL_BUNDLE, TemplateBundle};
pub use watch::{ConfigHandle, spawn_config_watcher};

/// Load configuration from the XDG hierarchy and validate it.
///
/// This is the high-level entry point that:
/// 1. Loads config from TOML files + env vars via Figment
/// 2. On success: runs post-deserialization validation
/// 3. On Figment error: converts to rich miette diagnostics with typo suggestions
///
/// Returns either a valid `BooklineConfig` or a list of diagnostic errors.
pub fn load_and_validate() -> Result<BooklineConfig, Vec<ConfigError>> {
    load_and_validate_with(None)
}

/// Like [`load_and_validate`], with an optional extra config file layered on
/// top of the XDG hierarchy (the `--config` flag).
pub fn load_and_validate_with(extra: Option<&Path>) -> Result<BooklineConfig, Vec<ConfigError>> {
    match loader::load_config_with(extra) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            // Read TOML source files for error source span information
            let toml_sources = collect_toml_sources(extra);
            Err(diagnostic::figment_to_config_errors(err, &toml_sources))
        }
    }
}

/// Load configuration from a specific TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<BooklineConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// The config files the loader consults, in precedence order, restricted to
/// those that currently exist. Suitable for the file watcher.
pub fn config_file_paths(extra: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("/etc/bookline/bookline.toml"));
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("bookline/bookline.toml"));
    }
    paths.push(PathBuf::from("bookline.toml"));
    if let Some(extra) = extra {
        paths.push(extra.to_path_buf());
    }

    paths.retain(|p| p.exists());
    paths
}

/// Collect TOML source file contents for error span resolution.
fn collect_toml_sources(extra: Option<&Path>) -> Vec<(String, String)> {
    let mut sources = Vec::new();

    // Local config
    if let Ok(content) = std::fs::read_to_string("bookline.toml") {
        let path = std::env::current_dir()
            .map(|d| d.join("bookline.toml").display().to_string())
            .unwrap_or_else(|_| "bookline.toml".to_string());
        sources.push((path, content));
    }

    // XDG user config
    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join("bookline/bookline.toml");
        if let Ok(content) = std::fs::read_to_string(&path) {
            sources.push((path.display().to_string(), content));
        }
    }

    // System config
    let system_path = Path::new("/etc/bookline/bookline.toml");
    if let Ok(content) = std::fs::read_to_string(system_path) {
        sources.push((system_path.display().to_string(), content));
    }

    // Explicit --config file
    if let Some(extra) = extra
        && let Ok(content) = std::fs::read_to_string(extra)
    {
        sources.push((extra.display().to_string(), content));
    }

    sources
}
