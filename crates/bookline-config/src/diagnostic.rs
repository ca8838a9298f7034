// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration error reporting.
//!
//! Figment deserialization failures are flattened into [`ConfigError`]
//! values that miette can render with a source span and a "did you mean?"
//! suggestion. The bookline config is one level of `[section]` tables, so
//! span lookup only ever has to find a key inside a single named section.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score below which a key is considered unrelated rather
/// than a typo. 0.75 catches `timzone` -> `timezone` and
/// `developer_nubmers` -> `developer_numbers` without suggesting noise.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration problem, carrying whatever context is available for
/// miette to point at the offending line.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key the config model does not know about.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(bookline::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that deserialized to the wrong type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(bookline::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    /// A required key that no layer supplied.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(bookline::config::missing_key),
        help("add `{key} = <value>` to your bookline.toml")
    )]
    MissingKey { key: String },

    /// A semantic check failed after deserialization succeeded.
    #[error("validation error: {message}")]
    #[diagnostic(code(bookline::config::validation))]
    Validation { message: String },

    /// Anything figment reports that does not fit the variants above.
    #[error("configuration error: {0}")]
    #[diagnostic(code(bookline::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Flatten a `figment::Error` (which may aggregate several failures) into
/// one `ConfigError` per problem. `toml_sources` holds the raw text of
/// each TOML layer so unknown keys can be pointed at in place.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let valid_keys: Vec<&str> = expected.to_vec();
                let (span, src) = locate_key(&error, field, toml_sources);
                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, &valid_keys),
                    valid_keys: valid_keys.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: field.clone().into_owned(),
            },
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: dotted_path(&error),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.to_string(),
            },
            _ => ConfigError::Other(format!("{error}")),
        })
        .collect()
}

fn dotted_path(error: &figment::error::Error) -> String {
    error
        .path
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Resolve the span of an unknown key in the TOML layer it came from.
fn locate_key(
    error: &figment::error::Error,
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let path = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    let Some((path, content)) = path
        .as_ref()
        .and_then(|p| toml_sources.iter().find(|(candidate, _)| candidate == p))
    else {
        return (None, None);
    };

    let section = error.path.first().map(|s| s.to_string());
    match find_key_offset(content, section.as_deref(), field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(path, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` within `section` of a flat TOML document, or
/// from the top when `section` is `None`. The search stops at the next
/// `[header]` so a key in a later section is never misattributed.
pub fn find_key_offset(content: &str, section: Option<&str>, field: &str) -> Option<usize> {
    let start = match section {
        None => 0,
        Some(name) => {
            let header = format!("[{name}]");
            content.find(&header)? + header.len()
        }
    };

    // `start` sits just past the matched header, so the first `[` seen
    // from here is the next section.
    let mut offset = start;
    for line in content[start..].lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            break;
        }
        if let Some(rest) = trimmed.strip_prefix(field)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len() + 1;
    }

    None
}

/// The closest valid key by Jaro-Winkler similarity, if any clears the
/// threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, key)| key.to_string())
}

/// Render errors to stderr through miette's graphical report handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggest_timzone_for_timezone() {
        let valid = &["timezone"];
        assert_eq!(suggest_key("timzone", valid), Some("timezone".to_string()));
    }

    #[test]
    fn suggest_tick_typo() {
        let valid = &[
            "debug",
            "developer_numbers",
            "reminder_before_hours",
            "thanks_after_hours",
            "dispatch_tick_secs",
            "overdue_grace_secs",
        ];
        assert_eq!(
            suggest_key("dispatch_tik_secs", valid),
            Some("dispatch_tick_secs".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["before", "after", "create"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn find_key_offset_in_section() {
        let content = "[delivery]\ndebgu = true\n";
        let offset = find_key_offset(content, Some("delivery"), "debgu");
        assert!(offset.is_some());
        let o = offset.unwrap();
        assert_eq!(&content[o..o + 5], "debgu");
    }

    #[test]
    fn find_key_offset_does_not_cross_section_boundary() {
        let content = "[delivery]\ndebug = true\n\n[poll]\ninterval_secs = 60\n";
        assert_eq!(find_key_offset(content, Some("delivery"), "interval_secs"), None);
        assert!(find_key_offset(content, Some("poll"), "interval_secs").is_some());
    }

    #[test]
    fn top_level_key_is_found_from_the_start() {
        let content = "verbose = true\n[delivery]\ndebug = false\n";
        assert_eq!(find_key_offset(content, None, "verbose"), Some(0));
    }
}
