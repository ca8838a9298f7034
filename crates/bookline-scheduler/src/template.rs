// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Template resolution and placeholder rendering.
//!
//! Bundles are keyed by staff resource name with per-field fallback to the
//! `general` bundle: a staff bundle may override just the wording it cares
//! about. Rendering substitutes `{placeholder}` from the enriched field map
//! and fails naming the placeholder when the data does not supply it.

use std::collections::HashMap;

use bookline_config::model::{GENERAL_BUNDLE, TemplateBundle, TemplatesConfig};
use bookline_core::BooklineError;
use bookline_core::types::Action;

use crate::task::Phase;

/// Immutable view over the configured template bundles.
///
/// Built per operation from the current config snapshot, so a hot reload is
/// picked up by the next appointment without restarting anything.
pub struct TemplateCatalog<'a> {
    bundles: &'a HashMap<String, TemplateBundle>,
}

impl<'a> TemplateCatalog<'a> {
    pub fn new(templates: &'a TemplatesConfig) -> Self {
        Self {
            bundles: &templates.bundles,
        }
    }

    fn staff_bundle(&self, staff: &str) -> Option<&'a TemplateBundle> {
        if staff.is_empty() {
            return None;
        }
        self.bundles.get(staff)
    }

    fn general(&self) -> Option<&'a TemplateBundle> {
        self.bundles.get(GENERAL_BUNDLE)
    }

    /// Field-level lookup: the staff bundle first, then `general`.
    fn field<F>(&self, staff: &str, pick: F) -> Option<&'a str>
    where
        F: Fn(&'a TemplateBundle) -> Option<&'a String>,
    {
        self.staff_bundle(staff)
            .and_then(&pick)
            .or_else(|| self.general().and_then(&pick))
            .map(String::as_str)
    }

    /// The reminder template for one phase.
    pub fn reminder(&self, staff: &str, phase: Phase) -> Result<&'a str, BooklineError> {
        self.field(staff, |b| match phase {
            Phase::Before => b.before.as_ref(),
            Phase::After => b.after.as_ref(),
        })
        .ok_or_else(|| {
            BooklineError::Template(format!("no `{phase}` template for staff `{staff}`"))
        })
    }

    /// The action-confirmation template, preferring the client-initiated
    /// variant when `by_client` and one is configured.
    pub fn confirmation(
        &self,
        staff: &str,
        action: Action,
        by_client: bool,
    ) -> Result<&'a str, BooklineError> {
        if by_client
            && let Some(template) = self.field(staff, |b| match action {
                Action::Create => b.create_by_client.as_ref(),
                Action::Update => b.update_by_client.as_ref(),
                Action::Cancel => b.cancel_by_client.as_ref(),
                Action::Expire => b.expire_by_client.as_ref(),
            })
        {
            return Ok(template);
        }
        self.field(staff, |b| match action {
            Action::Create => b.create.as_ref(),
            Action::Update => b.update.as_ref(),
            Action::Cancel => b.cancel.as_ref(),
            Action::Expire => b.expire.as_ref(),
        })
        .ok_or_else(|| {
            BooklineError::Template(format!("no `{action}` template for staff `{staff}`"))
        })
    }
}

/// Substitute `{placeholder}` occurrences in `template` from `fields`.
///
/// `{{` and `}}` are literal braces. An unmatched `{` or a placeholder with
/// no value in the map is a [`BooklineError::Template`].
pub fn render(template: &str, fields: &HashMap<String, String>) -> Result<String, BooklineError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => {
                            return Err(BooklineError::Template(format!(
                                "unterminated placeholder `{{{name}` in template"
                            )));
                        }
                    }
                }
                let value = fields.get(&name).ok_or_else(|| {
                    BooklineError::Template(format!("template placeholder `{name}` has no value"))
                })?;
                out.push_str(value);
            }
            '}' => {
                return Err(BooklineError::Template(
                    "unmatched `}` in template".to_string(),
                ));
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn config_with_room() -> TemplatesConfig {
        let mut config = TemplatesConfig::default();
        config.bundles.insert(
            "Room 2".to_string(),
            TemplateBundle {
                before: Some("Room 2 reminder for {date_str}".to_string()),
                update_by_client: Some("You moved your booking to {date_str}".to_string()),
                ..TemplateBundle::default()
            },
        );
        config
    }

    #[test]
    fn render_substitutes_fields() {
        let out = render(
            "Reminder: {date_str} at {time_str}",
            &fields(&[("date_str", "21/08/2026"), ("time_str", "14:30")]),
        )
        .unwrap();
        assert_eq!(out, "Reminder: 21/08/2026 at 14:30");
    }

    #[test]
    fn render_missing_placeholder_names_it() {
        let err = render("Hi {first}", &fields(&[])).unwrap_err();
        assert!(matches!(err, BooklineError::Template(_)));
        assert!(err.to_string().contains("first"), "got: {err}");
    }

    #[test]
    fn render_doubled_braces_are_literal() {
        let out = render("{{literal}} {x}", &fields(&[("x", "v")])).unwrap();
        assert_eq!(out, "{literal} v");
    }

    #[test]
    fn render_unterminated_placeholder_is_an_error() {
        assert!(render("oops {open", &fields(&[])).is_err());
        assert!(render("oops }", &fields(&[])).is_err());
    }

    #[test]
    fn staff_bundle_overrides_general_per_field() {
        let config = config_with_room();
        let catalog = TemplateCatalog::new(&config);

        // Overridden field comes from the staff bundle.
        assert_eq!(
            catalog.reminder("Room 2", Phase::Before).unwrap(),
            "Room 2 reminder for {date_str}"
        );
        // Absent field falls through to general.
        assert!(
            catalog
                .reminder("Room 2", Phase::After)
                .unwrap()
                .contains("Thank you")
        );
    }

    #[test]
    fn unknown_staff_falls_back_to_general() {
        let config = config_with_room();
        let catalog = TemplateCatalog::new(&config);
        assert!(
            catalog
                .reminder("Room 9", Phase::Before)
                .unwrap()
                .contains("Reminder")
        );
        assert!(catalog.reminder("", Phase::Before).is_ok());
    }

    #[test]
    fn client_variant_preferred_when_present() {
        let config = config_with_room();
        let catalog = TemplateCatalog::new(&config);

        let t = catalog
            .confirmation("Room 2", Action::Update, true)
            .unwrap();
        assert_eq!(t, "You moved your booking to {date_str}");

        // Staff-initiated update uses the plain wording from general.
        let t = catalog
            .confirmation("Room 2", Action::Update, false)
            .unwrap();
        assert!(t.contains("moved"), "got: {t}");

        // No client variant configured for create: falls back to plain.
        let t = catalog.confirmation("Room 2", Action::Create, true).unwrap();
        assert!(t.contains("booked"), "got: {t}");
    }

    #[test]
    fn missing_everything_is_a_template_error() {
        let mut config = TemplatesConfig::default();
        config.bundles.clear();
        let catalog = TemplateCatalog::new(&config);
        let err = catalog.reminder("Room 2", Phase::Before).unwrap_err();
        assert!(matches!(err, BooklineError::Template(_)));
    }
}
