// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Green API WhatsApp gateway.
//!
//! Provides [`WaClient`] which handles request construction, instance
//! authentication (credentials live in the URL path), and error mapping.
//! Sends are one-shot: a failed delivery surfaces as an error and is never
//! retried here.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use bookline_config::model::WhatsappConfig;
use bookline_core::phone::{chat_id, normalize_msisdn};
use bookline_core::{BooklineError, Messenger};

/// HTTP client for Green API WhatsApp communication.
///
/// Endpoints follow the gateway's URL scheme
/// `{base}/waInstance{id}/{method}/{token}`.
#[derive(Debug, Clone)]
pub struct WaClient {
    client: reqwest::Client,
    base_url: String,
    instance_id: String,
    token: String,
}

impl WaClient {
    /// Creates a new gateway client from the WhatsApp configuration section.
    pub fn new(config: &WhatsappConfig) -> Result<Self, BooklineError> {
        let instance_id = config
            .instance_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                BooklineError::Config("whatsapp.instance_id is not configured".to_string())
            })?;
        let token = config
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BooklineError::Config("whatsapp.token is not configured".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BooklineError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            instance_id,
            token,
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/waInstance{}/{}/{}",
            self.base_url, self.instance_id, method, self.token
        )
    }

    /// Upload a file from disk and send it to `msisdn`, with an optional
    /// caption below the media.
    pub async fn send_file_by_upload(
        &self,
        msisdn: &str,
        file_path: &Path,
        caption: Option<&str>,
    ) -> Result<(), BooklineError> {
        let number = normalize_msisdn(msisdn)?;
        let chat = chat_id(&number);

        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                BooklineError::Validation(format!(
                    "upload path has no file name: {}",
                    file_path.display()
                ))
            })?;
        let data = tokio::fs::read(file_path).await?;

        let mut form = reqwest::multipart::Form::new()
            .text("chatId", chat.clone())
            .text("fileName", file_name.clone())
            .part(
                "file",
                reqwest::multipart::Part::bytes(data).file_name(file_name),
            );
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }

        let response = self
            .client
            .post(self.endpoint("sendFileByUpload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| BooklineError::Channel {
                message: format!("whatsapp upload request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BooklineError::Channel {
                message: format!("whatsapp gateway returned {status}: {body}"),
                source: None,
            });
        }
        debug!(chat = %chat, "whatsapp file delivered to gateway");
        Ok(())
    }
}

#[async_trait]
impl Messenger for WaClient {
    async fn send_message(&self, msisdn: &str, text: &str) -> Result<(), BooklineError> {
        let number = normalize_msisdn(msisdn)?;
        let chat = chat_id(&number);
        let body = serde_json::json!({
            "chatId": chat,
            "message": text,
        });

        let response = self
            .client
            .post(self.endpoint("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| BooklineError::Channel {
                message: format!("whatsapp request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BooklineError::Channel {
                message: format!("whatsapp gateway returned {status}: {body}"),
                source: None,
            });
        }
        debug!(chat = %chat, "whatsapp message delivered to gateway");
        Ok(())
    }
}
