//! Web search backends.
//!
//! Analysts only need "query in, ranked hits out" plus optional raw page
//! extraction for grounding, so both backends sit behind [`SearchProvider`].

pub mod duckduckgo;
pub mod tavily;

pub use duckduckgo::DuckDuckGoSearch;
pub use tavily::TavilySearch;

use crate::types::{Result, SearchHit};
use crate::utils::toml_config::{ResearchConfig, SearchConfig};
use async_trait::async_trait;
use std::sync::Arc;

/// Per-call search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub max_results: usize,
    /// Backend topic hint such as `news` or `finance`.
    pub topic: Option<String>,
}

impl SearchOptions {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results,
            topic: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Ranked hits for `query`.
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>>;

    /// Raw text of the page at `url`, `None` when the backend returned nothing.
    async fn extract(&self, url: &str) -> Result<Option<String>>;

    fn name(&self) -> &str;
}

/// Build the configured backend, resolving its credential from the environment.
pub fn from_config(config: &ResearchConfig) -> Result<Arc<dyn SearchProvider>> {
    match &config.search {
        SearchConfig::Tavily {
            api_key_env,
            search_depth,
            ..
        } => {
            let api_key = config.require_env(api_key_env)?;
            Ok(Arc::new(TavilySearch::new(api_key, search_depth.clone())?))
        }
        SearchConfig::DuckDuckGo { .. } => Ok(Arc::new(DuckDuckGoSearch::new())),
    }
}
