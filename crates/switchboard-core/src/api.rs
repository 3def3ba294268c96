//! Anthropic API client used for all text-generation calls

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Anthropic API client
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Mask the API key in debug output
        let masked_key = if self.api_key.len() > 7 {
            format!(
                "{}...{}",
                &self.api_key[..3],
                &self.api_key[self.api_key.len() - 4..]
            )
        } else {
            "***".to_string()
        };

        f.debug_struct("ApiClient")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &masked_key)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ApiClient {
    /// Create a new API client
    pub fn new(api_key: String, model: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: "https://api.anthropic.com".to_string(),
            model: model.unwrap_or_else(|| "claude-opus-4-6".to_string()),
            max_tokens: 4096,
        }
    }

    /// Set max tokens for responses
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set a custom base URL (e.g. for proxies or regional endpoints)
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Make a single chat request and return the concatenated text blocks
    pub async fn generate(&self, messages: &[ApiMessage], system: &str) -> Result<String> {
        let response = self.chat(messages, system).await?;

        let mut text = String::new();
        for block in &response.content {
            let ContentBlock::Text { text: block_text } = block;
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(block_text);
        }

        if text.is_empty() {
            return Err(anyhow!("No text response from model"));
        }

        Ok(text)
    }

    async fn chat(&self, messages: &[ApiMessage], system: &str) -> Result<ApiResponse> {
        let url = format!("{}/v1/messages", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": messages,
        });

        debug!(
            "Sending request to Anthropic API with {} messages",
            messages.len()
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .context("Failed to parse API response")?;

        debug!(
            "Received response with {} content blocks, stop_reason: {:?}",
            api_response.content.len(),
            api_response.stop_reason
        );

        Ok(api_response)
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Message in conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
}

impl ApiMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Content block in a response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
}

/// Response from the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

/// Token usage information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_client_creation() {
        let client = ApiClient::new("test-key".to_string(), None);
        assert_eq!(client.model, "claude-opus-4-6");
        assert_eq!(client.max_tokens, 4096);
    }

    #[test]
    fn test_api_client_builders() {
        let client = ApiClient::new("test-key".to_string(), Some("claude-sonnet-4-5".to_string()))
            .with_max_tokens(1024)
            .with_base_url("http://localhost:9999".to_string());
        assert_eq!(client.model(), "claude-sonnet-4-5");
        assert_eq!(client.max_tokens, 1024);
        assert_eq!(client.base_url, "http://localhost:9999");
    }

    #[test]
    fn test_api_client_debug_masks_key() {
        let client = ApiClient::new("sk-ant-1234567890abcdef".to_string(), None);
        let debug_output = format!("{:?}", client);

        // Should contain masked version
        assert!(debug_output.contains("sk-...cdef"));

        // Should NOT contain the full key
        assert!(!debug_output.contains("sk-ant-1234567890abcdef"));
    }

    #[test]
    fn test_api_client_debug_masks_short_key() {
        let client = ApiClient::new("short".to_string(), None);
        let debug_output = format!("{:?}", client);
        assert!(debug_output.contains("***"));
        assert!(!debug_output.contains("short"));
    }

    #[test]
    fn test_message_constructors() {
        let user = ApiMessage::user("hello");
        assert_eq!(user.role, "user");
        let assistant = ApiMessage::assistant("hi");
        assert_eq!(assistant.role, "assistant");
    }

    #[test]
    fn test_content_block_deserialization() {
        let json = r#"{"type": "text", "text": "Hello"}"#;
        let block: ContentBlock = serde_json::from_str(json).unwrap();
        let ContentBlock::Text { text } = block;
        assert_eq!(text, "Hello");
    }
}
