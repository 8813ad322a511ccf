//! Mock implementations for testing.
//!
//! Scripted completion and search backends shared by the integration tests,
//! so pipeline runs never touch the network.

#![allow(dead_code)]

use async_trait::async_trait;
use company_research::llm::{LLMClient, TextStream};
use company_research::search::{SearchOptions, SearchProvider};
use company_research::types::{AppError, Result, SearchHit};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Split a response into 5-character chunks to simulate streaming.
fn chunked(response: &str) -> TextStream {
    let chunks: Vec<String> = response
        .chars()
        .collect::<Vec<_>>()
        .chunks(5)
        .map(|c| c.iter().collect())
        .collect();

    Box::new(stream::iter(chunks.into_iter().map(Ok)).boxed())
}

enum Reply {
    Text(String),
    Fail,
    Hang,
}

/// Mock LLM client with responses keyed on prompt content.
///
/// Rules are checked in insertion order against `system + "\n" + prompt`;
/// the first rule whose needle occurs wins. Unmatched prompts get the
/// fallback response.
///
/// ```ignore
/// let llm = MockLLMClient::new("fallback")
///     .on("company fundamentals", "Acme products\nAcme history")
///     .failing_on("recent news coverage");
/// ```
pub struct MockLLMClient {
    rules: Vec<(String, Reply)>,
    fallback: Reply,
    calls: Mutex<Vec<String>>,
}

impl MockLLMClient {
    /// Create a new mock client that returns the given response.
    pub fn new(response: &str) -> Self {
        Self {
            rules: Vec::new(),
            fallback: Reply::Text(response.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        Self {
            rules: Vec::new(),
            fallback: Reply::Fail,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer prompts containing `needle` with `response`.
    pub fn on(mut self, needle: &str, response: &str) -> Self {
        self.rules
            .push((needle.to_string(), Reply::Text(response.to_string())));
        self
    }

    /// Fail prompts containing `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.rules.push((needle.to_string(), Reply::Fail));
        self
    }

    /// Never answer prompts containing `needle`.
    pub fn hanging_on(mut self, needle: &str) -> Self {
        self.rules.push((needle.to_string(), Reply::Hang));
        self
    }

    /// Every prompt seen so far, system and user text joined.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, needle: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.contains(needle)).count()
    }

    async fn reply(&self, system: &str, prompt: &str) -> Result<String> {
        let text = format!("{}\n{}", system, prompt);
        self.calls.lock().push(text.clone());

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, reply)| reply)
            .unwrap_or(&self.fallback);

        match reply {
            Reply::Text(response) => Ok(response.clone()),
            Reply::Fail => Err(AppError::LLM("Mock LLM failure".to_string())),
            Reply::Hang => {
                std::future::pending::<()>().await;
                Err(AppError::LLM("Mock LLM woke up".to_string()))
            }
        }
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.reply("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.reply(system, prompt).await
    }

    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TextStream> {
        let response = self.reply(system, prompt).await?;
        Ok(chunked(&response))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Mock search backend with hits keyed on query substrings.
#[derive(Default)]
pub struct MockSearch {
    rules: Vec<(String, Vec<SearchHit>)>,
    pages: HashMap<String, String>,
    fail: bool,
    fail_on: Vec<String>,
    queries: Mutex<Vec<(String, Option<String>)>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend whose every call errors.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Return `hits` for queries containing `needle` (case-insensitive).
    pub fn on(mut self, needle: &str, hits: Vec<SearchHit>) -> Self {
        self.rules.push((needle.to_lowercase(), hits));
        self
    }

    /// Fail queries containing `needle` (case-insensitive).
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on.push(needle.to_lowercase());
        self
    }

    /// Serve `content` as the extraction of `url`.
    pub fn with_page(mut self, url: &str, content: &str) -> Self {
        self.pages.insert(url.to_string(), content.to_string());
        self
    }

    /// Every (query, topic) searched so far.
    pub fn queries(&self) -> Vec<(String, Option<String>)> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        self.queries
            .lock()
            .push((query.to_string(), options.topic.clone()));
        let query = query.to_lowercase();
        if self.fail || self.fail_on.iter().any(|needle| query.contains(needle.as_str())) {
            return Err(AppError::Search("Mock search failure".to_string()));
        }

        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
            .map(|(_, hits)| hits.iter().take(options.max_results).cloned().collect())
            .unwrap_or_default())
    }

    async fn extract(&self, url: &str) -> Result<Option<String>> {
        if self.fail {
            return Err(AppError::Search("Mock extract failure".to_string()));
        }
        Ok(self.pages.get(url).cloned())
    }

    fn name(&self) -> &str {
        "mock-search"
    }
}

/// Build a search hit.
pub fn hit(url: &str, title: &str, content: &str, score: f32) -> SearchHit {
    SearchHit {
        url: url.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        score,
    }
}
