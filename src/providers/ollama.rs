use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app_config::RefinementConfig;
use crate::errors::ProviderError;
use crate::providers::RefinementProvider;

/// Ollama client for interacting with the Ollama generate API
#[derive(Debug)]
pub struct Ollama {
    /// Full generate endpoint URL
    url: String,
    /// Base URL without the API path, used for model discovery
    base_url: String,
    /// Model name to generate with
    model: String,
    /// HTTP client for making requests
    client: Client,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    /// Model name to use for generation
    model: &'a str,
    /// Prompt to generate from
    prompt: &'a str,
    /// Whether to stream the response
    stream: bool,
}

/// Generate response from the Ollama API
#[derive(Debug, Deserialize)]
struct GenerationResponse {
    /// Generated text
    response: String,
}

/// One installed model as reported by the tags endpoint
#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Response of the tags endpoint
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

impl Ollama {
    /// Create a client from the refinement configuration
    pub fn from_config(config: &RefinementConfig) -> Self {
        Self::new(&config.endpoint, &config.model, config.timeout_secs)
    }

    /// Create a new Ollama client
    pub fn new(endpoint: &str, model: &str, timeout_secs: u64) -> Self {
        let mut base_url = endpoint.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            base_url = "http://localhost:11434".to_string();
        }

        let url = if base_url.contains("/api/generate") {
            base_url.clone()
        } else {
            format!("{}/api/generate", base_url)
        };

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

    /// List the models installed on the server
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        debug!("Fetching Ollama models from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl RefinementProvider for Ollama {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!("Posting to Ollama: {}", self.url);

        let request = GenerationRequest {
            model: &self.model,
            prompt,
            stream: false,
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
            error!("Ollama API error ({}): {}", status, message);
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let generated: GenerationResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(generated.response)
    }
}
