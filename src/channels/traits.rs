//! Channel Trait Definitions
//!
//! Outbound messaging seam used by the reminder job.

use async_trait::async_trait;

/// Error types for channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel not configured")]
    NotConfigured,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Sends proactive text messages to a customer
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Channel name identifier
    fn name(&self) -> &str;

    /// Whether credentials are present
    fn is_ready(&self) -> bool;

    /// Send `text` to a normalized phone, returning the provider message id
    async fn send_text(&self, phone: &str, text: &str) -> Result<String, ChannelError>;
}

/// Sender used when no gateway credentials are configured
pub struct DisabledSender;

#[async_trait]
impl MessageSender for DisabledSender {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_ready(&self) -> bool {
        false
    }

    async fn send_text(&self, _phone: &str, _text: &str) -> Result<String, ChannelError> {
        Err(ChannelError::NotConfigured)
    }
}
