//! Chat Completion Client
//!
//! OpenAI-compatible `/v1/chat/completions` client behind the `ChatModel`
//! trait, so the assistant can be driven by a fake in tests.

use crate::conversation::ConversationMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error types for chat completion calls
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("OPENAI_API_KEY not set")]
    NotConfigured,

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Empty completion")]
    EmptyResponse,
}

/// Anything that turns a message list into one assistant reply
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier reported by the health endpoint
    fn model_name(&self) -> &str;

    async fn complete(&self, messages: &[ConversationMessage], temperature: f32) -> Result<String, LlmError>;
}

/// API request
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// API response
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

/// OpenAI chat completions client
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: Option<&str>, model: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.map(|s| s.to_string()),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from config
    pub fn from_config(config: &crate::config::Config) -> Self {
        let mut client = Self::new(config.openai_api_key.as_deref(), &config.openai_model);
        if let Some(url) = &config.openai_base_url {
            client = client.with_base_url(url);
        }
        client
    }

    /// Overrides the base URL (self-hosted gateways, tests)
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Check if API key is configured
    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ConversationMessage], temperature: f32) -> Result<String, LlmError> {
        let api_key = self.api_key.as_ref().ok_or(LlmError::NotConfigured)?;

        let request = CompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature,
        };

        debug!("Calling chat completions: model={}, messages={}", self.model, messages.len());

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let result: CompletionResponse = response.json().await?;

        if let Some(usage) = &result.usage {
            info!(
                "Completion: model={}, in={}, out={}",
                self.model, usage.prompt_tokens, usage.completion_tokens
            );
        }

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let msgs = [
            ConversationMessage::system("sys"),
            ConversationMessage::user("oi"),
        ];
        let request = CompletionRequest {
            model: "gpt-4o-mini",
            messages: msgs
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: 0.7,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "oi");
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"  Olá!  "}}],
                      "usage":{"prompt_tokens":10,"completion_tokens":2,"total_tokens":12}}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("  Olá!  "));
        assert_eq!(parsed.usage.unwrap().completion_tokens, 2);
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let client = OpenAiClient::new(None, "gpt-4o-mini");
        assert!(!client.is_available());
        let err = client.complete(&[ConversationMessage::user("oi")], 0.7).await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OpenAiClient::new(Some("k"), "m").with_base_url("http://localhost:9999/v1/");
        assert_eq!(client.base_url, "http://localhost:9999/v1");
    }

    #[tokio::test]
    async fn test_complete_against_mock() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": " Temos sim! "}}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(Some("sk-test"), "gpt-4o-mini").with_base_url(&server.uri());
        let reply = client.complete(&[ConversationMessage::user("tem Pulse?")], 0.7).await.unwrap();
        assert_eq!(reply, "Temos sim!");
    }

    #[tokio::test]
    async fn test_api_error_status() {
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(Some("sk-test"), "gpt-4o-mini").with_base_url(&server.uri());
        let err = client.complete(&[ConversationMessage::user("oi")], 0.7).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 429, .. }));
    }
}
