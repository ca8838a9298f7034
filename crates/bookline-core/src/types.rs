// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The appointment event model shared by the webhook and poll paths.
//!
//! Appointments are owned by the external booking system; what arrives here
//! is a transient JSON view with loose typing (numeric ids, `From_date` in
//! webhooks vs `from` in poll batches, truthy flags as strings or numbers).
//! Deserialization
//! absorbs that looseness once so the rest of the pipeline works with one
//! canonical shape.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Webhook action codes sent by the booking system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Cancel,
    Expire,
}

impl Action {
    /// Map the upstream numeric action code. Unknown codes return `None`
    /// and must be rejected by the caller.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "1" => Some(Action::Create),
            "2" => Some(Action::Update),
            "3" => Some(Action::Cancel),
            "5" => Some(Action::Expire),
            _ => None,
        }
    }

    /// True for the actions that terminate an appointment.
    pub fn is_removal(self) -> bool {
        matches!(self, Action::Cancel | Action::Expire)
    }
}

/// One appointment event as observed from a webhook delivery or a poll
/// batch. Unknown upstream fields are retained in `extra` so that
/// configured filters and templates can reference them.
#[derive(Debug, Clone, Deserialize)]
pub struct Appointment {
    #[serde(alias = "id", deserialize_with = "de_stringish")]
    pub apptid: String,

    #[serde(rename = "From_date", alias = "from_date", alias = "from")]
    pub from_date: String,

    #[serde(default, rename = "To_date", alias = "to_date", alias = "to")]
    pub to_date: Option<String>,

    #[serde(default)]
    pub staffname: Option<String>,

    #[serde(default, rename = "customercell", alias = "cell")]
    pub cell: Option<String>,

    #[serde(default, deserialize_with = "de_opt_stringish")]
    pub status: Option<String>,

    #[serde(default, deserialize_with = "de_opt_stringish")]
    pub action: Option<String>,

    #[serde(default, deserialize_with = "de_opt_stringish")]
    pub updateby: Option<String>,

    #[serde(default, deserialize_with = "de_truthy")]
    pub cancelled: bool,

    #[serde(default)]
    pub tmp_expire_date: Option<Value>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Appointment {
    /// Staff name with surrounding whitespace removed; empty when absent.
    pub fn staff(&self) -> &str {
        self.staffname.as_deref().unwrap_or("").trim()
    }

    /// True when the event was initiated by the client rather than staff.
    pub fn by_client(&self) -> bool {
        self.updateby.as_deref().is_some_and(|v| v.trim() == "99")
    }

    /// Look up a field by its upstream name, for configured filter
    /// predicates. Typed fields take precedence over `extra`.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "apptid" | "id" => Some(self.apptid.clone()),
            "From_date" | "from_date" | "from" => Some(self.from_date.clone()),
            "To_date" | "to_date" | "to" => self.to_date.clone(),
            "staffname" => self.staffname.clone(),
            "customercell" | "cell" => self.cell.clone(),
            "status" => self.status.clone(),
            "action" => self.action.clone(),
            "updateby" => self.updateby.clone(),
            _ => self.extra.get(name).map(value_to_display),
        }
    }

    /// Flatten every field into a string map for template substitution.
    /// Keys use the canonical lowercase names.
    pub fn field_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("apptid".to_string(), self.apptid.clone());
        map.insert("from_date".to_string(), self.from_date.clone());
        if let Some(v) = &self.to_date {
            map.insert("to_date".to_string(), v.clone());
        }
        if let Some(v) = &self.staffname {
            map.insert("staffname".to_string(), v.clone());
        }
        if let Some(v) = &self.cell {
            map.insert("cell".to_string(), v.clone());
        }
        if let Some(v) = &self.status {
            map.insert("status".to_string(), v.clone());
        }
        if let Some(v) = &self.action {
            map.insert("action".to_string(), v.clone());
        }
        if let Some(v) = &self.updateby {
            map.insert("updateby".to_string(), v.clone());
        }
        for (k, v) in &self.extra {
            map.entry(k.clone()).or_insert_with(|| value_to_display(v));
        }
        map
    }
}

/// Python-style truthiness over a JSON value: null, `false`, `0`, `""`,
/// `[]` and `{}` are false, everything else is true. Upstream flag fields
/// arrive in all of these shapes.
pub fn value_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn value_to_display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn de_stringish<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    match v {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn de_opt_stringish<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn de_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref().is_some_and(value_truthy))
}
