use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::default::Default;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language name, embedded into refinement prompts
    pub source_language: String,

    /// Target language name, embedded into refinement prompts
    pub target_language: String,

    /// Translation engine config
    #[serde(default)]
    pub engine: EngineConfig,

    /// Refinement config
    #[serde(default)]
    pub refinement: RefinementConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Refinement provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RefinementProviderKind {
    // @provider: Ollama
    #[default]
    Ollama,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
    // @provider: OpenAI
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: Google Gemini
    Gemini,
}

impl RefinementProviderKind {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::LMStudio => "LM Studio",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Gemini => "Google Gemini",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::Gemini => "gemini".to_string(),
        }
    }
}

// Implement Display trait for RefinementProviderKind
impl std::fmt::Display for RefinementProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Implement FromStr trait for RefinementProviderKind
impl std::str::FromStr for RefinementProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "lmstudio" => Ok(Self::LMStudio),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "gemini" => Ok(Self::Gemini),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Translation engine configuration.
///
/// The engine is an external command fed one segment on stdin and expected to
/// print the translation on stdout.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EngineConfig {
    // @field: Engine executable
    #[serde(default = "String::new")]
    pub command: String,

    // @field: Extra engine arguments
    #[serde(default)]
    pub args: Vec<String>,
}

/// Refinement backend configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefinementConfig {
    // @field: Whether the refinement pass runs at all
    #[serde(default)]
    pub enabled: bool,

    // @field: Provider selection
    #[serde(default)]
    pub provider: RefinementProviderKind,

    // @field: Model name (empty selects the provider default)
    #[serde(default = "String::new")]
    pub model: String,

    // @field: Service URL for local providers
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: API key for hosted providers
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Source characters accumulated per refinement chunk
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,

    // @field: Per-request transfer timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: RefinementProviderKind::default(),
            model: String::new(),
            endpoint: String::new(),
            api_key: String::new(),
            chunk_chars: default_chunk_chars(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_chunk_chars() -> usize {
    // Roughly 1000-1500 tokens, fits modern local-model context windows while
    // limiting request count
    3000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.source_language.trim().is_empty() || self.target_language.trim().is_empty() {
            return Err(anyhow!("Source and target languages must be set"));
        }

        // API key is required for hosted refinement providers
        if self.refinement.enabled {
            match self.refinement.provider {
                RefinementProviderKind::OpenAI
                | RefinementProviderKind::Anthropic
                | RefinementProviderKind::Gemini => {
                    if self.refinement.api_key.is_empty() {
                        return Err(anyhow!(
                            "Refinement API key is required for {} provider",
                            self.refinement.provider.display_name()
                        ));
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "English".to_string(),
            target_language: "French".to_string(),
            engine: EngineConfig::default(),
            refinement: RefinementConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
