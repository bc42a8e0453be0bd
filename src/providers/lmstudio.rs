use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app_config::RefinementConfig;
use crate::errors::ProviderError;
use crate::providers::RefinementProvider;

/// LM Studio client, speaking the OpenAI-compatible chat completions protocol
/// against a local server
#[derive(Debug)]
pub struct LMStudio {
    /// Full chat completions endpoint URL
    url: String,
    /// Base URL without the API path, used for model discovery
    base_url: String,
    /// Model name ("default" when left empty, the server picks)
    model: String,
    /// HTTP client for making requests
    client: Client,
}

/// Chat message object
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: String,
    /// Content of the message
    pub content: String,
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// One completion choice
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// One model entry of the models endpoint
#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Response of the models endpoint
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

impl LMStudio {
    /// Create a client from the refinement configuration
    pub fn from_config(config: &RefinementConfig) -> Self {
        Self::new(&config.endpoint, &config.model, config.timeout_secs)
    }

    /// Create a new LM Studio client
    pub fn new(endpoint: &str, model: &str, timeout_secs: u64) -> Self {
        let mut base_url = endpoint.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            base_url = "http://localhost:1234".to_string();
        }

        let url = if base_url.contains("/v1/") {
            base_url.clone()
        } else {
            format!("{}/v1/chat/completions", base_url)
        };

        let model = if model.is_empty() { "default" } else { model };

        Self {
            url,
            base_url,
            model: model.to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
        }
    }

    /// List the models loaded on the server
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/v1/models", self.base_url);
        debug!("Fetching LM Studio models from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl RefinementProvider for LMStudio {
    fn name(&self) -> &'static str {
        "LM Studio"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!("Posting to LM Studio: {}", self.url);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.3,
        };

        let response = self
            .client
            .post(&self.url)
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
            error!("LM Studio API error ({}): {}", status, message);
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let choice = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("empty choices in response".to_string()))?;

        Ok(choice.message.content)
    }
}
