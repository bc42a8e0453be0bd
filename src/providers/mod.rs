/*!
 * Provider implementations for the refinement backends.
 *
 * This module contains client implementations for the supported LLM providers:
 * - Ollama: Local LLM server
 * - LM Studio: Local OpenAI-compatible server
 * - OpenAI: OpenAI API integration
 * - Anthropic: Anthropic API integration
 * - Gemini: Google Gemini API integration
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::app_config::{RefinementConfig, RefinementProviderKind};
use crate::errors::ProviderError;

/// Common trait for all refinement providers
///
/// Each provider issues exactly one HTTP request per completion call and
/// extracts the generated text from its own response shape, allowing the
/// refinement queue to use them interchangeably.
#[async_trait]
pub trait RefinementProvider: Send + Sync + Debug {
    /// Human-readable provider name
    fn name(&self) -> &'static str;

    /// Complete one refinement prompt
    ///
    /// # Arguments
    /// * `prompt` - The full instruction prompt for the backend
    ///
    /// # Returns
    /// * `Result<String, ProviderError>` - The generated text or an error
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Build the provider selected by the configuration
pub fn create_provider(config: &RefinementConfig) -> Box<dyn RefinementProvider> {
    match config.provider {
        RefinementProviderKind::Ollama => Box::new(ollama::Ollama::from_config(config)),
        RefinementProviderKind::LMStudio => Box::new(lmstudio::LMStudio::from_config(config)),
        RefinementProviderKind::OpenAI => Box::new(openai::OpenAI::from_config(config)),
        RefinementProviderKind::Anthropic => Box::new(anthropic::Anthropic::from_config(config)),
        RefinementProviderKind::Gemini => Box::new(gemini::Gemini::from_config(config)),
    }
}

pub mod anthropic;
pub mod gemini;
pub mod lmstudio;
pub mod mock;
pub mod ollama;
pub mod openai;
