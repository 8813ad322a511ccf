//! The research state machine.
//!
//! ```text
//! INIT -> GROUNDING -> RESEARCHING (4 analysts in parallel) -> COMPILING -> DONE | FAILED
//! ```
//!
//! [`ResearchPipeline::run`] yields the state patches in order; folding them
//! with [`ResearchState::apply`] reproduces the final state, which is what
//! [`ResearchPipeline::run_to_state`] does.

use super::analyst::{default_analysts, Analyst, AnalystRunner, GroundingSnapshot};
use super::editor::Editor;
use super::grounding::Grounder;
use super::progress::{NoopProgress, ProgressHandle, ProgressSink, ProgressStatus};
use super::retriever::Retriever;
use super::state::{Phase, ResearchState, StatePatch};
use crate::citations::{FactMatcher, PatternCatalog};
use crate::fixtures::FixtureStore;
use crate::llm::{LLMClient, LLMClientFactory, ModelSettings, Provider};
use crate::search::{self, SearchProvider};
use crate::types::{Category, CompanyProfile, Result};
use crate::utils::toml_config::{ProviderConfig, ResearchConfig, RetrievalMode};
use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// One client per completion stage.
#[derive(Clone)]
pub struct StageClients {
    pub queries: Arc<dyn LLMClient>,
    pub briefing: Arc<dyn LLMClient>,
    pub compile: Arc<dyn LLMClient>,
    pub sweep: Arc<dyn LLMClient>,
}

impl StageClients {
    /// The same client for every stage.
    pub fn uniform(llm: Arc<dyn LLMClient>) -> Self {
        Self {
            queries: llm.clone(),
            briefing: llm.clone(),
            compile: llm.clone(),
            sweep: llm,
        }
    }

    /// Clients for the configured provider and per-stage models.
    pub fn from_config(config: &ResearchConfig) -> Result<Self> {
        let provider = match &config.provider {
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
            } => Provider::OpenAI {
                api_key: config.require_env(api_key_env)?,
                api_base: api_base.clone(),
                model: config.models.compile.clone(),
            },
            ProviderConfig::Ollama { base_url } => Provider::Ollama {
                base_url: base_url.clone(),
                model: config.models.compile.clone(),
            },
        };
        let factory = LLMClientFactory::new(
            provider,
            ModelSettings {
                temperature: config.models.temperature,
                max_tokens: config.models.max_tokens,
            },
        );

        Ok(Self {
            queries: factory.create_for_model(&config.models.queries)?,
            briefing: factory.create_for_model(&config.models.briefing)?,
            compile: factory.create_for_model(&config.models.compile)?,
            sweep: factory.create_for_model(&config.models.sweep)?,
        })
    }
}

pub struct ResearchPipeline {
    analysts: Vec<Arc<dyn Analyst>>,
    runner: Arc<AnalystRunner>,
    grounder: Grounder,
    editor: Editor,
    source_mode: RetrievalMode,
    progress: Arc<dyn ProgressSink>,
}

impl ResearchPipeline {
    /// Assemble a pipeline from explicit clients.
    ///
    /// `search` may be `None` in local mode; remote mode without it fails
    /// every retrieval with a configuration error.
    pub fn new(
        clients: StageClients,
        search: Option<Arc<dyn SearchProvider>>,
        config: &ResearchConfig,
    ) -> Result<Self> {
        let matcher: Arc<dyn FactMatcher> =
            Arc::new(PatternCatalog::with_extra(&config.citations.extra_patterns)?);
        let fixtures = FixtureStore::new(config.research.fixture_dir.clone());
        let timeout = config.research.request_timeout();
        let mode = config.research.mode;

        let retriever = Retriever::new(
            mode,
            search.clone(),
            fixtures.clone(),
            config.search.max_results(),
            timeout,
        );

        Ok(Self {
            analysts: default_analysts(),
            runner: Arc::new(AnalystRunner {
                queries_llm: clients.queries,
                briefing_llm: clients.briefing,
                retriever,
                citations: config.citations.clone(),
                matcher: matcher.clone(),
                max_queries: config.research.max_queries,
                timeout,
                briefing_doc_chars: config.research.briefing_doc_chars,
            }),
            grounder: Grounder::new(mode, search, fixtures, timeout),
            editor: Editor::new(
                clients.compile,
                clients.sweep,
                matcher,
                config.citations.clone(),
                timeout,
            ),
            source_mode: mode,
            progress: Arc::new(NoopProgress),
        })
    }

    /// Build everything from configuration and the environment.
    pub fn from_config(config: &ResearchConfig) -> Result<Self> {
        let clients = StageClients::from_config(config)?;
        let search = match config.research.mode {
            RetrievalMode::Remote => Some(search::from_config(config)?),
            RetrievalMode::Local => None,
        };
        Self::new(clients, search, config)
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Replace the analyst roster.
    pub fn with_analysts(mut self, analysts: Vec<Arc<dyn Analyst>>) -> Self {
        self.analysts = analysts;
        self
    }

    /// Run one job, yielding state patches in phase order.
    ///
    /// Analyst patches arrive in completion order. The stream ends after the
    /// patch that moves the job to `Done` or `Failed`.
    pub fn run(&self, company: CompanyProfile, job_id: impl Into<String>) -> impl Stream<Item = StatePatch> + Send + '_ {
        let progress = ProgressHandle::new(job_id, self.progress.clone());

        stream! {
            let mut state = ResearchState::new(company.clone(), progress.clone());
            let job_id = progress.job_id().to_string();

            if let Err(e) = company.validate() {
                progress.emit_error(ProgressStatus::Failed, "Research failed", e.to_string());
                yield StatePatch::failed(e.to_string());
                return;
            }

            info!(job_id = %job_id, company = %company.name, mode = ?self.source_mode, "Research started");
            let patch = StatePatch::phase(Phase::Grounding).with_message(format!("Researching {}", company.name));
            state.apply(patch.clone());
            yield patch;

            let patch = self.grounder.ground(&company, &progress).await;
            state.apply(patch.clone());
            yield patch;

            let patch = StatePatch::phase(Phase::Researching);
            state.apply(patch.clone());
            yield patch;
            progress.emit(ProgressStatus::Processing, "Starting parallel research");

            let snapshot = GroundingSnapshot {
                company: company.clone(),
                site_scrape: state.site_scrape.clone(),
                source: self.runner.retriever.source(),
                progress: progress.clone(),
            };

            let mut set = JoinSet::new();
            for analyst in &self.analysts {
                let analyst = analyst.clone();
                let runner = self.runner.clone();
                let snapshot = snapshot.clone();
                set.spawn(async move {
                    let category = analyst.category();
                    (category, runner.run(analyst.as_ref(), &snapshot).await)
                });
            }

            // Barrier: every analyst settles before compilation starts
            while let Some(joined) = set.join_next().await {
                let patch = match joined {
                    Ok((category, Ok(report))) => {
                        let mut patch = StatePatch::default().with_message(format!(
                            "{}: {} documents from {} queries",
                            category.analyst_name(),
                            report.documents.len(),
                            report.queries.len()
                        ));
                        patch.documents.insert(category, report.documents);
                        if let Some(briefing) = report.briefing {
                            patch.briefings.insert(category, briefing);
                        }
                        patch
                    }
                    Ok((category, Err(e))) => {
                        if e.is_recoverable() {
                            warn!(job_id = %job_id, %category, error = %e, "Analyst failed");
                        } else {
                            error!(job_id = %job_id, %category, error = %e, "Analyst failed on a fatal error");
                        }
                        progress.emit_error(
                            ProgressStatus::CategoryFailed,
                            format!("{} research failed", category.heading()),
                            e.to_string(),
                        );
                        StatePatch::default().with_message(format!("{} failed: {}", category.analyst_name(), e))
                    }
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "Analyst task aborted");
                        StatePatch::default().with_message(format!("Analyst task aborted: {}", e))
                    }
                };
                state.apply(patch.clone());
                yield patch;
            }

            let briefed: Vec<Category> = state.briefings.keys().copied().collect();
            info!(job_id = %job_id, briefings = ?briefed, documents = state.document_count(), "Research settled");
            let patch = StatePatch::phase(Phase::Compiling);
            state.apply(patch.clone());
            yield patch;

            match self.editor.compile(&state).await {
                Ok(patch) => {
                    progress.emit_result(
                        ProgressStatus::Completed,
                        "Research completed",
                        json!({ "briefings": briefed }),
                    );
                    yield patch;
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Compilation failed");
                    progress.emit_error(ProgressStatus::Failed, "Research failed", e.to_string());
                    yield StatePatch::failed(e.to_string());
                }
            }
        }
    }

    /// Run one job and fold every patch into the final state.
    pub async fn run_to_state(&self, company: CompanyProfile, job_id: impl Into<String>) -> ResearchState {
        let job_id = job_id.into();
        let progress = ProgressHandle::new(job_id.clone(), self.progress.clone());
        let mut state = ResearchState::new(company.clone(), progress);

        let patches = self.run(company, job_id);
        futures::pin_mut!(patches);
        while let Some(patch) = patches.next().await {
            state.apply(patch);
        }
        state
    }
}
