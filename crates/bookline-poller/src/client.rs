// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the booking platform's incremental export endpoint.
//!
//! Provides [`PollClient`] which fetches appointment batches for a date
//! window and tracks the platform's `lu` (last-update) cursor between calls.
//! The cursor only advances on a fully successful response, so a transport
//! or platform error makes the next poll re-request the same increment.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use bookline_config::model::PollConfig;
use bookline_core::BooklineError;

/// HTTP client for the booking platform export API.
///
/// Holds the in-memory `lu` cursor. The cursor is deliberately not persisted:
/// a fresh process re-reads the whole current window once and relies on the
/// dedup store to drop what it has already seen.
#[derive(Debug)]
pub struct PollClient {
    client: reqwest::Client,
    base_url: String,
    cursor: Option<String>,
}

/// Response envelope of the export endpoint.
///
/// `appts` is either an array of appointment objects or a human-readable
/// note such as `"no new information"`.
#[derive(Debug, Deserialize)]
struct PollResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    appts: Option<ApptsField>,
    #[serde(default, deserialize_with = "de_opt_stringish")]
    lu: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApptsField {
    Items(Vec<serde_json::Value>),
    Note(String),
}

/// Accepts strings and bare numbers; the platform is not consistent about
/// which one it sends for the cursor.
fn de_opt_stringish<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

impl PollClient {
    /// Creates a new poll client from the poll configuration section.
    pub fn new(config: &PollConfig) -> Result<Self, BooklineError> {
        let base_url = config
            .base_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| BooklineError::Config("poll.base_url is not configured".to_string()))?;
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| BooklineError::Config("poll.api_key is not configured".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "torkey",
            HeaderValue::from_str(&api_key)
                .map_err(|e| BooklineError::Config(format!("invalid poll.api_key value: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BooklineError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url,
            cursor: None,
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// The current `lu` cursor, if any poll has succeeded yet.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Forget the cursor so the next fetch re-reads the whole window.
    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }

    /// Fetch appointments changed in the `[from, to]` window (compact
    /// `YYYYMMDD` dates) since the last successful poll.
    ///
    /// Returns the raw appointment objects; an empty vector means the
    /// platform reported nothing new. The cursor advances only on an `Ok`
    /// response carrying an appointment array; a "no new information" note
    /// leaves it where it was.
    pub async fn fetch(
        &mut self,
        from: &str,
        to: &str,
    ) -> Result<Vec<serde_json::Value>, BooklineError> {
        let mut query = vec![
            ("from".to_string(), from.to_string()),
            ("to".to_string(), to.to_string()),
            ("format".to_string(), "2".to_string()),
        ];
        if let Some(cursor) = &self.cursor {
            query.push(("lu".to_string(), cursor.clone()));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| BooklineError::Channel {
                message: format!("poll request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BooklineError::Channel {
                message: format!("poll endpoint returned {status}: {body}"),
                source: None,
            });
        }

        let body: PollResponse = response.json().await.map_err(|e| BooklineError::Channel {
            message: format!("failed to parse poll response: {e}"),
            source: Some(Box::new(e)),
        })?;

        if body.status != 1 {
            return Err(BooklineError::Channel {
                message: format!("poll endpoint reported status {}", body.status),
                source: None,
            });
        }

        // A "no new information" note leaves the cursor untouched: only a
        // response that actually carried an appointment array advances it.
        let items = match body.appts {
            Some(ApptsField::Items(items)) => items,
            Some(ApptsField::Note(note)) => {
                debug!(note = %note, "poll returned no appointment array");
                return Ok(Vec::new());
            }
            None => Vec::new(),
        };

        if let Some(lu) = body.lu {
            self.cursor = Some(lu);
        }

        Ok(items)
    }
}
