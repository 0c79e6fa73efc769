//! WhatsApp Channel Implementation
//!
//! Uses the Twilio WhatsApp API.
//!
//! # Configuration
//!
//! Environment variables:
//! - `TWILIO_ACCOUNT_SID`: Twilio account SID
//! - `TWILIO_AUTH_TOKEN`: Twilio auth token
//! - `TWILIO_WHATSAPP_FROM`: Your Twilio WhatsApp number (e.g., +14155238886)
//!
//! # Webhook Setup
//!
//! Configure Twilio to POST incoming messages to `https://your-domain.com/webhook`
//! (or `/whatsapp`). The reply goes back in the HTTP response as TwiML.

use super::traits::*;
use crate::phone::to_whatsapp_address;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const TWILIO_API_URL: &str = "https://api.twilio.com/2010-04-01";

/// Twilio caps WhatsApp bodies at 1600 characters
pub const MAX_MESSAGE_LENGTH: usize = 1600;

/// WhatsApp channel configuration
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Twilio Account SID
    pub account_sid: String,
    /// Twilio Auth Token
    pub auth_token: String,
    /// Twilio WhatsApp number (with country code)
    pub whatsapp_number: String,
    /// Maximum message length
    pub max_message_length: usize,
}

impl WhatsAppConfig {
    /// All three credentials, or nothing
    pub fn from_parts(
        account_sid: Option<&str>,
        auth_token: Option<&str>,
        whatsapp_number: Option<&str>,
    ) -> Option<Self> {
        let present = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        Some(Self {
            account_sid: present(account_sid)?,
            auth_token: present(auth_token)?,
            whatsapp_number: present(whatsapp_number)?,
            max_message_length: MAX_MESSAGE_LENGTH,
        })
    }
}

/// Twilio webhook incoming data
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TwilioWebhookData {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub body: String,
    pub message_sid: Option<String>,
    pub profile_name: Option<String>,
}

/// Twilio API response
#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: String,
}

/// TwiML document carrying one reply message
pub fn twiml(text: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Message>{}</Message></Response>"#,
        quick_xml::escape::escape(text)
    )
}

/// Outbound WhatsApp messages via Twilio REST
pub struct TwilioSender {
    config: WhatsAppConfig,
    client: reqwest::Client,
    api_base: String,
}

impl TwilioSender {
    pub fn new(config: WhatsAppConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            client,
            api_base: TWILIO_API_URL.to_string(),
        }
    }

    /// Override the API base URL
    pub fn with_api_base(mut self, url: &str) -> Self {
        self.api_base = url.trim_end_matches('/').to_string();
        self
    }

    /// Send message via Twilio API
    async fn send_twilio_message(&self, to: &str, body: &str) -> Result<String, ChannelError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base, self.config.account_sid
        );

        let to_formatted = to_whatsapp_address(to);
        let from_formatted = to_whatsapp_address(&self.config.whatsapp_number);
        let form = [
            ("From", from_formatted.as_str()),
            ("To", to_formatted.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        if response.status().is_success() {
            let result: TwilioMessageResponse = response
                .json()
                .await
                .map_err(|e| ChannelError::Internal(e.to_string()))?;
            debug!("Twilio accepted message {} to {}", result.sid, to);
            Ok(result.sid)
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            match status.as_u16() {
                401 | 403 => Err(ChannelError::AuthenticationFailed(error_text)),
                429 => Err(ChannelError::RateLimited(60)),
                _ => Err(ChannelError::SendFailed(format!(
                    "Twilio error {}: {}",
                    status, error_text
                ))),
            }
        }
    }

    /// Split long messages into chunks
    fn split_message(&self, content: &str) -> Vec<String> {
        let max_len = self.config.max_message_length;
        if content.chars().count() <= max_len {
            return vec![content.to_string()];
        }

        let mut chunks = Vec::new();
        let mut current = String::new();

        for line in content.lines() {
            let line_len = line.chars().count();
            if current.chars().count() + line_len + 1 > max_len {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }

                // Handle lines longer than max
                if line_len > max_len {
                    let chars: Vec<char> = line.chars().collect();
                    for chunk in chars.chunks(max_len) {
                        chunks.push(chunk.iter().collect());
                    }
                } else {
                    current = line.to_string();
                }
            } else {
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(line);
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

#[async_trait]
impl MessageSender for TwilioSender {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn send_text(&self, phone: &str, text: &str) -> Result<String, ChannelError> {
        if phone.trim().is_empty() {
            return Err(ChannelError::InvalidRecipient(phone.to_string()));
        }

        let chunks = self.split_message(text);
        let mut last_id = String::new();

        for (i, chunk) in chunks.iter().enumerate() {
            last_id = self.send_twilio_message(phone, chunk).await?;

            // Small delay between chunks to maintain order
            if i < chunks.len() - 1 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        info!("WhatsApp message sent to {} ({} part(s))", phone, chunks.len());
        Ok(last_id)
    }
}
