use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app_config::RefinementConfig;
use crate::errors::ProviderError;
use crate::providers::RefinementProvider;

/// OpenAI chat completions client
#[derive(Debug)]
pub struct OpenAI {
    /// Model name to use
    model: String,
    /// API key for authentication
    api_key: String,
    /// HTTP client for API requests
    client: Client,
}

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Chat message format
#[derive(Debug, Serialize, Deserialize)]
struct Message {
    /// Role of the message sender (user, assistant)
    role: String,
    /// Content of the message
    content: String,
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

/// One completion choice
#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

impl OpenAI {
    /// Create a client from the refinement configuration
    pub fn from_config(config: &RefinementConfig) -> Self {
        Self::new(&config.api_key, &config.model, config.timeout_secs)
    }

    /// Create a new OpenAI client
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Self {
        let model = if model.is_empty() { "gpt-4o-mini" } else { model };
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
impl RefinementProvider for OpenAI {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!("Posting to OpenAI");

        let request = CompletionRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.3,
        };

        let response = self
            .client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
            error!("OpenAI API error ({}): {}", status, message);
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("empty choices in response".to_string()))?;

        Ok(choice.message.content)
    }
}
