//! LLM Provider Clients and Abstractions
//!
//! Every completion call the pipeline makes (query generation, briefings and
//! both editor passes) goes through the [`LLMClient`] trait, so tests and
//! alternative backends plug in without touching the research code.
//!
//! # Supported Providers
//!
//! - OpenAI-compatible chat completions (OpenAI, OpenRouter, vLLM, ...), always built
//! - `ollama` - Local Ollama server
//!
//! # Example
//!
//! ```ignore
//! use company_research::llm::{LLMClientFactory, ModelSettings, Provider};
//!
//! let factory = LLMClientFactory::new(provider, ModelSettings::default());
//! let client = factory.create_for_model("openai/gpt-4.1-mini")?;
//! let text = client.generate("What is 2+2?").await?;
//! ```

/// Core LLM client trait, provider selection and factory.
pub mod client;
/// OpenAI-compatible client with SSE streaming.
pub mod openai;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use client::{LLMClient, LLMClientFactory, ModelSettings, Provider, TextStream};
