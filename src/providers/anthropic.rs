use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app_config::RefinementConfig;
use crate::errors::ProviderError;
use crate::providers::RefinementProvider;

/// Anthropic client for interacting with the Anthropic messages API
#[derive(Debug)]
pub struct Anthropic {
    /// Model name to use
    model: String,
    /// API key for authentication
    api_key: String,
    /// HTTP client for API requests
    client: Client,
}

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic message format
#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    /// Role of the message sender (user, assistant)
    role: &'a str,
    /// Content of the message
    content: &'a str,
}

/// Anthropic message request
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    /// The model to use
    model: &'a str,
    /// Maximum number of tokens to generate
    max_tokens: u32,
    /// The messages for the conversation
    messages: Vec<AnthropicMessage<'a>>,
}

/// Anthropic response
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    /// The content of the response
    #[serde(default)]
    content: Vec<AnthropicContent>,
}

/// Individual content block in an Anthropic response
#[derive(Debug, Deserialize)]
struct AnthropicContent {
    /// The actual text content
    text: String,
}

impl Anthropic {
    /// Create a client from the refinement configuration
    pub fn from_config(config: &RefinementConfig) -> Self {
        Self::new(&config.api_key, &config.model, config.timeout_secs)
    }

    /// Create a new Anthropic client
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Self {
        let model = if model.is_empty() {
            "claude-3-haiku-20240307"
        } else {
            model
        };
        Self {
            model: model.to_string(),
            api_key: api_key.to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl RefinementProvider for Anthropic {
    fn name(&self) -> &'static str {
        "Anthropic"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!("Posting to Anthropic");

        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: 4096,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Anthropic API error ({}): {}", status, message);
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let block = parsed
            .content
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("empty content in response".to_string()))?;

        Ok(block.text)
    }
}
