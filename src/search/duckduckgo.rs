//! DuckDuckGo backend powered by daedra.
//!
//! DuckDuckGo supplies no relevance score, so hits carry a rank-derived score
//! (first hit 1.0, decreasing) to keep citation ordering meaningful.

use super::{SearchOptions, SearchProvider};
use crate::types::{AppError, Result, SearchHit};
use async_trait::async_trait;

pub struct DuckDuckGoSearch;

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new()
    }
}

fn rank_score(rank: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    1.0 - (rank as f32 / total as f32)
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        // No topic filter on DuckDuckGo; fold it into the query instead
        let query = match &options.topic {
            Some(topic) if topic == "news" => format!("{} news", query),
            _ => query.to_string(),
        };

        let search_args = daedra::SearchArgs {
            query,
            options: Some(daedra::SearchOptions {
                num_results: options.max_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let total = response.data.len();
        Ok(response
            .data
            .iter()
            .enumerate()
            .map(|(rank, r)| SearchHit {
                url: r.url.to_string(),
                title: r.title.to_string(),
                content: r.description.to_string(),
                score: rank_score(rank, total),
            })
            .collect())
    }

    async fn extract(&self, url: &str) -> Result<Option<String>> {
        let fetch_args = daedra::VisitPageArgs {
            url: url.to_string(),
            include_images: false,
            selector: None,
        };

        let page = daedra::tools::fetch::fetch_page(&fetch_args)
            .await
            .map_err(|e| AppError::Search(format!("Failed to fetch page: {}", e)))?;

        let content = page.content;
        Ok(if content.trim().is_empty() {
            None
        } else {
            Some(content)
        })
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}
