use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::app_config::RefinementConfig;
use crate::errors::ProviderError;
use crate::providers::RefinementProvider;

/// Google Gemini client for the generateContent API.
///
/// Gemini reports quota and auth problems as an `error` object inside a 200
/// response; that shape maps to `ProviderError::Backend`, which terminates the
/// remaining refinement queue instead of being retried.
#[derive(Debug)]
pub struct Gemini {
    /// Model name to use
    model: String,
    /// API key, passed in the query string
    api_key: String,
    /// HTTP client for API requests
    client: Client,
}

/// One text part of a content object
#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// Content object wrapping the prompt parts
#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

/// generateContent request body
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

impl Gemini {
    /// Create a client from the refinement configuration
    pub fn from_config(config: &RefinementConfig) -> Self {
        Self::new(&config.api_key, &config.model, config.timeout_secs)
    }

    /// Create a new Gemini client
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Self {
        let model = if model.is_empty() {
            "gemini-1.5-flash"
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

    fn request_url(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }
}

#[async_trait]
impl RefinementProvider for Gemini {
    fn name(&self) -> &'static str {
        "Google Gemini"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!("Posting to Google Gemini");

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.request_url())
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
            error!("Gemini API error ({}): {}", status, message);
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        // An error object inside the body halts the whole queue
        if let Some(error_obj) = body.get("error") {
            let message = error_obj
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            warn!("Gemini reported error: {}", message);
            return Err(ProviderError::Backend(message));
        }

        let text = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str());

        match text {
            Some(text) => Ok(text.to_string()),
            None => Err(ProviderError::ParseError(
                "empty candidates in response, check your API quota".to_string(),
            )),
        }
    }
}
