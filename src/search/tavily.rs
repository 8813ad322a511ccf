use super::{SearchOptions, SearchProvider};
use crate::types::{AppError, Result, SearchHit};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const TAVILY_API_BASE: &str = "https://api.tavily.com";

/// Tavily search and extract API client.
pub struct TavilySearch {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    search_depth: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'a str>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    api_key: &'a str,
    urls: [&'a str; 1],
    extract_depth: &'a str,
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    results: Vec<ExtractResult>,
}

#[derive(Deserialize)]
struct ExtractResult {
    #[serde(default)]
    raw_content: Option<String>,
}

impl TavilySearch {
    pub fn new(api_key: String, search_depth: String) -> Result<Self> {
        Self::with_base_url(api_key, search_depth, TAVILY_API_BASE.to_string())
    }

    /// Point the client at another host (proxies, test servers).
    pub fn with_base_url(api_key: String, search_depth: String, api_base: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            search_depth,
        })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> Result<R> {
        let response = self
            .http
            .post(format!("{}/{}", self.api_base, path))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Search(format!("Tavily request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Search(format!(
                "Tavily {} returned {}: {}",
                path, status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Search(format!("Invalid Tavily {} response: {}", path, e)))
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let body = SearchRequest {
            api_key: &self.api_key,
            query,
            search_depth: &self.search_depth,
            max_results: options.max_results,
            topic: options.topic.as_deref(),
        };

        let response: SearchResponse = self.post("search", &body).await?;

        Ok(response
            .results
            .into_iter()
            .filter(|hit| !hit.url.is_empty())
            .collect())
    }

    async fn extract(&self, url: &str) -> Result<Option<String>> {
        let body = ExtractRequest {
            api_key: &self.api_key,
            urls: [url],
            extract_depth: "advanced",
        };

        let response: ExtractResponse = self.post("extract", &body).await?;

        Ok(response
            .results
            .into_iter()
            .next()
            .and_then(|r| r.raw_content)
            .filter(|content| !content.trim().is_empty()))
    }

    fn name(&self) -> &str {
        "tavily"
    }
}
