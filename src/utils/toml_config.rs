//! TOML-based configuration for the research pipeline
//!
//! This module provides declarative configuration for the completion provider,
//! the per-stage models, the search backend, retrieval mode, citation tuning
//! and logging via a TOML file (`research.toml`).
//!
//! Credentials never live in the file. Each section names the environment
//! variable that holds its secret, and [`ResearchConfig::validate`] checks the
//! variables that the selected mode actually needs.

use crate::citations::CitationStyle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from research.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub research: PipelineConfig,

    #[serde(default)]
    pub citations: CitationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Any OpenAI-compatible chat completions endpoint (OpenAI, OpenRouter, vLLM).
    OpenAI {
        /// Environment variable containing API key
        #[serde(default = "default_openai_key_env")]
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::OpenAI {
            api_key_env: default_openai_key_env(),
            api_base: default_openai_base(),
        }
    }
}

// ============= Model Configuration =============

/// Model identifiers per pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_small_model")]
    pub queries: String,

    #[serde(default = "default_small_model")]
    pub briefing: String,

    #[serde(default = "default_large_model")]
    pub compile: String,

    #[serde(default = "default_small_model")]
    pub sweep: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_small_model() -> String {
    "openai/gpt-4.1-mini".to_string()
}

fn default_large_model() -> String {
    "openai/gpt-4.1".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            queries: default_small_model(),
            briefing: default_small_model(),
            compile: default_large_model(),
            sweep: default_small_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
        }
    }
}

// ============= Search Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchConfig {
    Tavily {
        #[serde(default = "default_tavily_key_env")]
        api_key_env: String,
        #[serde(default = "default_search_depth")]
        search_depth: String,
        #[serde(default = "default_max_results")]
        max_results: usize,
    },
    /// DuckDuckGo via daedra, no credential required.
    DuckDuckGo {
        #[serde(default = "default_max_results")]
        max_results: usize,
    },
}

fn default_tavily_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_search_depth() -> String {
    "basic".to_string()
}

fn default_max_results() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig::Tavily {
            api_key_env: default_tavily_key_env(),
            search_depth: default_search_depth(),
            max_results: default_max_results(),
        }
    }
}

impl SearchConfig {
    pub fn max_results(&self) -> usize {
        match self {
            SearchConfig::Tavily { max_results, .. } => *max_results,
            SearchConfig::DuckDuckGo { max_results } => *max_results,
        }
    }
}

// ============= Pipeline Configuration =============

/// Where analysts fetch documents from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Remote search with write-through into the fixture store.
    #[default]
    Remote,
    /// Fixture store only; no network calls for retrieval or grounding.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub mode: RetrievalMode,

    #[serde(default = "default_max_queries")]
    pub max_queries: usize,

    /// Upper bound for any single external call (completion, search, extraction).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_fixture_dir")]
    pub fixture_dir: PathBuf,

    /// Characters of each document fed into a category briefing.
    #[serde(default = "default_briefing_doc_chars")]
    pub briefing_doc_chars: usize,
}

fn default_max_queries() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    60
}

fn default_fixture_dir() -> PathBuf {
    PathBuf::from("local_data")
}

fn default_briefing_doc_chars() -> usize {
    2000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::default(),
            max_queries: default_max_queries(),
            request_timeout_secs: default_request_timeout(),
            fixture_dir: default_fixture_dir(),
            briefing_doc_chars: default_briefing_doc_chars(),
        }
    }
}

impl PipelineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============= Citation Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationConfig {
    #[serde(default)]
    pub style: CitationStyle,

    /// Hits whose spans are at most this many characters apart share one citation.
    #[serde(default = "default_merge_tolerance")]
    pub merge_tolerance: usize,

    /// Source chunks are merged until they exceed this length.
    #[serde(default = "default_min_fact_chars")]
    pub min_fact_chars: usize,

    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,

    /// Additional pattern categories, name -> regexes.
    #[serde(default)]
    pub extra_patterns: BTreeMap<String, Vec<String>>,
}

fn default_merge_tolerance() -> usize {
    3
}

fn default_min_fact_chars() -> usize {
    40
}

fn default_title_max_chars() -> usize {
    80
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            style: CitationStyle::default(),
            merge_tolerance: default_merge_tolerance(),
            min_fact_chars: default_min_fact_chars(),
            title_max_chars: default_title_max_chars(),
            extra_patterns: BTreeMap::new(),
        }
    }
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(err: ConfigError) -> Self {
        crate::types::AppError::Configuration(err.to_string())
    }
}

impl ResearchConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_without_env(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and check values, leaving credentials unchecked so the
    /// caller can decide when they are needed.
    pub fn load_without_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        config.validate_values()?;

        Ok(config)
    }

    /// Parse without validating env vars (used by `init` and tests).
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate internal consistency and the credentials the selected mode needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_values()?;

        if let ProviderConfig::OpenAI { api_key_env, .. } = &self.provider {
            self.validate_env_var(api_key_env)?;
        }

        if self.research.mode == RetrievalMode::Remote {
            if let SearchConfig::Tavily { api_key_env, .. } = &self.search {
                self.validate_env_var(api_key_env)?;
            }
        }

        Ok(())
    }

    /// Checks that do not depend on the environment.
    pub fn validate_values(&self) -> Result<(), ConfigError> {
        if self.research.max_queries == 0 {
            return Err(ConfigError::ValidationError(
                "research.max_queries must be at least 1".to_string(),
            ));
        }
        if self.research.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "research.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.search.max_results() == 0 {
            return Err(ConfigError::ValidationError(
                "search.max_results must be at least 1".to_string(),
            ));
        }
        if self.citations.title_max_chars < 4 {
            return Err(ConfigError::ValidationError(
                "citations.title_max_chars must be at least 4".to_string(),
            ));
        }
        for (name, patterns) in &self.citations.extra_patterns {
            for pattern in patterns {
                regex::Regex::new(pattern).map_err(|e| {
                    ConfigError::ValidationError(format!(
                        "citations.extra_patterns.{}: invalid regex '{}': {}",
                        name, pattern, e
                    ))
                })?;
            }
        }
        for (stage, model) in [
            ("queries", &self.models.queries),
            ("briefing", &self.models.briefing),
            ("compile", &self.models.compile),
            ("sweep", &self.models.sweep),
        ] {
            if model.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "models.{} must not be empty",
                    stage
                )));
            }
        }
        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Resolve a required secret, failing with the variable name.
    pub fn require_env(&self, env_name: &str) -> Result<String, ConfigError> {
        self.resolve_env(env_name)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(env_name.to_string()))
    }
}
