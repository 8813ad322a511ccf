//! Document retrieval for one analyst: fixture store in local mode, remote
//! search with write-through in remote mode.

use super::progress::{ProgressHandle, ProgressStatus};
use crate::fixtures::FixtureStore;
use crate::search::{SearchOptions, SearchProvider};
use crate::types::{AppError, Category, Document, DocumentMap, DocumentSource, Result, SearchHit};
use crate::utils::toml_config::RetrievalMode;
use crate::utils::with_timeout;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct Retriever {
    mode: RetrievalMode,
    search: Option<Arc<dyn SearchProvider>>,
    fixtures: FixtureStore,
    max_results: usize,
    timeout: Duration,
}

impl Retriever {
    pub fn new(
        mode: RetrievalMode,
        search: Option<Arc<dyn SearchProvider>>,
        fixtures: FixtureStore,
        max_results: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            mode,
            search,
            fixtures,
            max_results,
            timeout,
        }
    }

    pub fn source(&self) -> DocumentSource {
        match self.mode {
            RetrievalMode::Local => DocumentSource::Local,
            RetrievalMode::Remote => DocumentSource::Remote,
        }
    }

    /// Retrieve every query concurrently and merge the results by url.
    ///
    /// A failing query is logged and skipped; its siblings still count.
    /// Queries merge in the order given, so a url returned by several queries
    /// keeps the last one.
    pub async fn retrieve(
        &self,
        company: &str,
        queries: &[String],
        topic: Option<&str>,
        category: Category,
        progress: &ProgressHandle,
    ) -> Result<DocumentMap> {
        let search = match (self.mode, &self.search) {
            (RetrievalMode::Remote, None) => {
                return Err(AppError::Configuration(
                    "Remote retrieval requires a search provider".to_string(),
                ))
            }
            (RetrievalMode::Remote, Some(search)) => Some(search.as_ref()),
            (RetrievalMode::Local, _) => None,
        };

        let mut options = SearchOptions::new(self.max_results);
        if let Some(topic) = topic {
            options = options.with_topic(topic);
        }

        let results = join_all(queries.iter().map(|query| {
            let options = &options;
            async move {
                let result = match search {
                    Some(search) => self.search_remote(search, company, query, options).await,
                    None => self.lookup_local(company, query).await,
                };
                (query, result)
            }
        }))
        .await;

        let source = self.source();
        let mut documents = DocumentMap::new();
        for (query, result) in results {
            match result {
                Ok(hits) => {
                    progress.emit_result(
                        ProgressStatus::QuerySearched,
                        format!("Found {} results for query", hits.len()),
                        json!({
                            "query": query,
                            "category": category.analyst_name(),
                            "results": hits.len(),
                            "source": source.as_str(),
                        }),
                    );
                    for hit in hits {
                        if hit.url.is_empty() {
                            continue;
                        }
                        documents.insert(hit.url.clone(), Document::from_hit(hit, query, source));
                    }
                }
                Err(e) => {
                    warn!(%category, query = %query, error = %e, "Query retrieval failed");
                    progress.emit_error(
                        ProgressStatus::QueryError,
                        format!("Search failed for query: {}", query),
                        e.to_string(),
                    );
                }
            }
        }

        info!(%category, queries = queries.len(), documents = documents.len(), %source, "Retrieval finished");
        Ok(documents)
    }

    async fn lookup_local(&self, company: &str, query: &str) -> Result<Vec<SearchHit>> {
        match self.fixtures.lookup(company, query).await? {
            Some(hits) => Ok(hits),
            None => {
                debug!(company, query, "No fixture for query");
                Ok(Vec::new())
            }
        }
    }

    async fn search_remote(
        &self,
        search: &dyn SearchProvider,
        company: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        let hits = with_timeout("search", self.timeout, search.search(query, options)).await?;

        if !hits.is_empty() {
            if let Err(e) = self.fixtures.store(company, query, &hits).await {
                warn!(company, query, error = %e, "Failed to cache search results");
            }
        }
        Ok(hits)
    }
}
