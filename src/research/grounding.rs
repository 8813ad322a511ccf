//! Homepage grounding.
//!
//! Extracts the company homepage once so every analyst starts from the same
//! snapshot. Never fails the job: errors land in `grounding_error`.

use super::progress::{ProgressHandle, ProgressStatus};
use super::state::StatePatch;
use crate::fixtures::FixtureStore;
use crate::search::SearchProvider;
use crate::types::{AppError, CompanyProfile, Result};
use crate::utils::logging::OpTimer;
use crate::utils::toml_config::RetrievalMode;
use crate::utils::with_timeout;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct Grounder {
    mode: RetrievalMode,
    search: Option<Arc<dyn SearchProvider>>,
    fixtures: FixtureStore,
    timeout: Duration,
}

impl Grounder {
    pub fn new(
        mode: RetrievalMode,
        search: Option<Arc<dyn SearchProvider>>,
        fixtures: FixtureStore,
        timeout: Duration,
    ) -> Self {
        Self {
            mode,
            search,
            fixtures,
            timeout,
        }
    }

    pub async fn ground(&self, company: &CompanyProfile, progress: &ProgressHandle) -> StatePatch {
        let mut patch = StatePatch::default();
        let Some(url) = company.url.as_deref() else {
            return patch.with_message(format!("No website given for {}, skipping grounding", company.name));
        };

        progress.emit(
            ProgressStatus::Processing,
            format!("Extracting homepage of {}", company.name),
        );
        let timer = OpTimer::new("grounding", "extract");
        let result = self.extract(url).await;
        timer.finish_with_result(result.as_ref());

        match result {
            Ok(Some(content)) => {
                info!(url, chars = content.len(), "Homepage extracted");
                patch.site_scrape = Some(content);
                patch.with_message(format!("Extracted homepage {}", url))
            }
            Ok(None) => patch.with_message(format!("Homepage {} returned no content", url)),
            Err(e) => {
                warn!(url, error = %e, "Grounding failed, continuing without homepage");
                progress.emit_error(
                    ProgressStatus::Processing,
                    "Homepage extraction failed",
                    e.to_string(),
                );
                patch.grounding_error = Some(e.to_string());
                patch.with_message(format!("Homepage extraction failed: {}", e))
            }
        }
    }

    async fn extract(&self, url: &str) -> Result<Option<String>> {
        match self.mode {
            RetrievalMode::Local => self.fixtures.site_extraction(url).await,
            RetrievalMode::Remote => {
                let search = self.search.as_ref().ok_or_else(|| {
                    AppError::Configuration("Remote grounding requires a search provider".to_string())
                })?;
                let content = with_timeout("homepage extraction", self.timeout, search.extract(url)).await?;
                if let Some(content) = &content {
                    if let Err(e) = self.fixtures.store_site_extraction(url, content).await {
                        warn!(url, error = %e, "Failed to cache homepage extraction");
                    }
                }
                Ok(content)
            }
        }
    }
}
