//! Outbound signer notifications via the Resend API
//!
//! Email is a secondary effect everywhere it is used: send failures are
//! logged and swallowed by callers, never rolling back the operation
//! that triggered them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email send failed: {0}")]
    Send(String),
}

/// Fields of a "document awaiting your signature" notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub to: String,
    pub signer_name: String,
    pub document_title: String,
    pub document_url: String,
    pub creator_name: String,
}

#[derive(Debug, Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResendSuccessResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResendErrorResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Direct Resend API client.
pub struct EmailClient {
    http: reqwest::Client,
    api_key: String,
    from_address: String,
}

impl EmailClient {
    pub fn new(api_key: String, from_address: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            from_address,
        }
    }

    /// Build a client from `RESEND_API_KEY` / `EMAIL_FROM`; `None` when
    /// no API key is configured.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("RESEND_API_KEY").ok()?;
        let from_address = std::env::var("EMAIL_FROM")
            .unwrap_or_else(|_| "Signflow <noreply@signflow.example>".to_string());
        Some(Self::new(api_key, from_address))
    }

    /// Send a notification, returning the provider message id.
    pub async fn send_notification(&self, note: &Notification) -> Result<String, EmailError> {
        let subject = format!("Document awaiting your signature - {}", note.document_title);
        let html = notification_html(note);
        let to = [note.to.clone()];

        let payload = ResendPayload {
            from: &self.from_address,
            to: &to,
            subject: &subject,
            html: &html,
        };

        let response = self
            .http
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EmailError::Send(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            match response.json::<ResendSuccessResponse>().await {
                Ok(success) => {
                    tracing::info!("Notification sent to {}: id={}", note.to, success.id);
                    Ok(success.id)
                }
                // Response parse error but the email was accepted.
                Err(e) => {
                    tracing::warn!("Resend response parse error: {}", e);
                    Ok("resend:unknown".to_string())
                }
            }
        } else {
            let error_text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ResendErrorResponse>(&error_text) {
                Ok(err) => err
                    .message
                    .or(err.name)
                    .unwrap_or_else(|| format!("HTTP {}", status)),
                Err(_) => format!("HTTP {}: {}", status, error_text),
            };
            Err(EmailError::Send(message))
        }
    }
}

fn notification_html(note: &Notification) -> String {
    format!(
        "<div style=\"font-family: sans-serif; max-width: 600px;\">\
         <h2>Document awaiting your signature</h2>\
         <p>Hi {signer},</p>\
         <p>{creator} has asked you to sign <strong>{title}</strong>.</p>\
         <p><a href=\"{url}\">Review and sign the document</a></p>\
         <p style=\"color: #666; font-size: 12px;\">\
         If you were not expecting this document you can ignore this email.</p>\
         </div>",
        signer = escape_html(&note.signer_name),
        creator = escape_html(&note.creator_name),
        title = escape_html(&note.document_title),
        url = note.document_url,
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
