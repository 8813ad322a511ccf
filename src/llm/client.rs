//! LLM Client abstractions and provider management
//!
//! This module provides a unified interface over the completion services the
//! pipeline talks to:
//! - **OpenAI-compatible**: OpenAI, OpenRouter and any server speaking the
//!   chat-completions protocol, with SSE streaming
//! - **Ollama**: local inference with streaming (feature `ollama`)

use crate::types::{AppError, Result};
use async_trait::async_trait;
use futures::Stream;
use std::sync::Arc;

/// Incremental text deltas from a streaming completion.
pub type TextStream = Box<dyn Stream<Item = Result<String>> + Send + Unpin>;

/// Generic LLM client trait for provider abstraction
///
/// The pipeline only needs "submit prompt, receive text", either in one piece
/// or as a stream of deltas.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate with system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Stream a completion with system prompt
    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TextStream>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Sampling settings applied to every request of a client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 4096,
        }
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI-compatible chat completions endpoint
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://openrouter.ai/api/v1".to_string(),
    ///     model: "openai/gpt-4.1-mini".to_string(),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
    },

    /// Ollama local LLM provider
    Ollama { base_url: String, model: String },
}

impl Provider {
    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider was compiled out or its configuration
    /// is unusable.
    pub fn create_client(&self, settings: ModelSettings) -> Result<Arc<dyn LLMClient>> {
        match self {
            Provider::OpenAI {
                api_key,
                api_base,
                model,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                settings,
            ))),

            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Arc::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone(), settings)?,
            )),

            #[cfg(not(feature = "ollama"))]
            Provider::Ollama { model, .. } => Err(AppError::Configuration(format!(
                "Ollama support is not compiled in (requested model '{}'). \
                 Rebuild with `--features ollama`.",
                model
            ))),
        }
    }

    /// Same provider pointed at a different model.
    pub fn with_model(&self, model: &str) -> Self {
        match self {
            Provider::OpenAI {
                api_key, api_base, ..
            } => Provider::OpenAI {
                api_key: api_key.clone(),
                api_base: api_base.clone(),
                model: model.to_string(),
            },
            Provider::Ollama { base_url, .. } => Provider::Ollama {
                base_url: base_url.clone(),
                model: model.to_string(),
            },
        }
    }

    /// Check if this provider is compiled in
    pub fn is_implemented(&self) -> bool {
        match self {
            Provider::OpenAI { .. } => true,
            Provider::Ollama { .. } => cfg!(feature = "ollama"),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }
}

/// Configuration-based client factory
///
/// Holds the provider connection details and the sampling settings, and
/// creates one client per model id.
pub struct LLMClientFactory {
    default_provider: Provider,
    settings: ModelSettings,
}

impl LLMClientFactory {
    /// Create a new factory with the specified default provider
    pub fn new(default_provider: Provider, settings: ModelSettings) -> Self {
        Self {
            default_provider,
            settings,
        }
    }

    /// Create a client using the default provider and its own model
    pub fn create_default(&self) -> Result<Arc<dyn LLMClient>> {
        self.default_provider.create_client(self.settings)
    }

    /// Create a client for `model` on the default provider
    pub fn create_for_model(&self, model: &str) -> Result<Arc<dyn LLMClient>> {
        self.default_provider
            .with_model(model)
            .create_client(self.settings)
    }

    /// Get a reference to the default provider
    pub fn default_provider(&self) -> &Provider {
        &self.default_provider
    }
}
