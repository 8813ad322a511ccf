//! The analyst contract and the four category analysts.
//!
//! One analyst task runs: streamed query generation, retrieval of every
//! query, aggregation into the category document map, then the category
//! briefing.

use super::briefing::write_briefing;
use super::progress::{ProgressHandle, ProgressStatus};
use super::retriever::Retriever;
use crate::citations::{CitationEngine, FactMatcher};
use crate::llm::LLMClient;
use crate::types::{AppError, Category, CompanyProfile, Document, DocumentMap, DocumentSource, Result};
use crate::utils::logging::OpTimer;
use crate::utils::toml_config::CitationConfig;
use crate::utils::with_timeout;
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One research dimension: what to ask for and how to search for it.
pub trait Analyst: Send + Sync {
    fn category(&self) -> Category;

    /// Category-specific instructions for query generation.
    fn query_focus(&self, company: &CompanyProfile) -> String;

    /// Search topic hint passed to the backend.
    fn search_topic(&self) -> Option<&'static str> {
        None
    }

    /// Whether the grounding scrape is added to this category's documents.
    fn includes_site_scrape(&self) -> bool {
        true
    }
}

pub struct CompanyAnalyst;
pub struct IndustryAnalyst;
pub struct FinancialAnalyst;
pub struct NewsAnalyst;

impl Analyst for CompanyAnalyst {
    fn category(&self) -> Category {
        Category::Company
    }

    fn query_focus(&self, company: &CompanyProfile) -> String {
        format!(
            "Generate queries on the company fundamentals of {} in the {} industry such as:\n\
             - Core products and services\n\
             - Company history and milestones\n\
             - Leadership team\n\
             - Business model and strategy",
            company.name,
            company.industry_or_unknown()
        )
    }
}

impl Analyst for IndustryAnalyst {
    fn category(&self) -> Category {
        Category::Industry
    }

    fn query_focus(&self, company: &CompanyProfile) -> String {
        let industry = company.industry_or_unknown();
        format!(
            "Generate queries on the industry analysis of {} in the {} industry such as:\n\
             - Market position\n\
             - Competitors\n\
             - {} industry trends and challenges\n\
             - Market size and growth",
            company.name, industry, industry
        )
    }

    fn includes_site_scrape(&self) -> bool {
        false
    }
}

impl Analyst for FinancialAnalyst {
    fn category(&self) -> Category {
        Category::Financial
    }

    fn query_focus(&self, company: &CompanyProfile) -> String {
        format!(
            "Generate queries on the financial analysis of {} in the {} industry such as:\n\
             - Fundraising history and valuation\n\
             - Financial statements and key metrics\n\
             - Revenue and profit sources",
            company.name,
            company.industry_or_unknown()
        )
    }

    fn search_topic(&self) -> Option<&'static str> {
        Some("finance")
    }
}

impl Analyst for NewsAnalyst {
    fn category(&self) -> Category {
        Category::News
    }

    fn query_focus(&self, company: &CompanyProfile) -> String {
        format!(
            "Generate queries on the recent news coverage of {} such as:\n\
             - Recent company announcements\n\
             - Press releases\n\
             - New partnerships",
            company.name
        )
    }

    fn search_topic(&self) -> Option<&'static str> {
        Some("news")
    }
}

/// The four analysts in report order.
pub fn default_analysts() -> Vec<Arc<dyn Analyst>> {
    vec![
        Arc::new(CompanyAnalyst),
        Arc::new(IndustryAnalyst),
        Arc::new(FinancialAnalyst),
        Arc::new(NewsAnalyst),
    ]
}

/// Splits a streamed completion into one query per line.
#[derive(Debug, Default)]
pub struct QueryParser {
    current: String,
}

impl QueryParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a delta, returning the queries it completed.
    pub fn push(&mut self, delta: &str) -> Vec<String> {
        self.current.push_str(delta);
        let mut completed = Vec::new();
        while let Some(pos) = self.current.find('\n') {
            let line: String = self.current.drain(..=pos).collect();
            if let Some(query) = clean_query(&line) {
                completed.push(query);
            }
        }
        completed
    }

    /// Text of the line still being generated.
    pub fn partial(&self) -> &str {
        &self.current
    }

    /// The trailing fragment, which counts as a query when non-empty.
    pub fn finish(self) -> Option<String> {
        clean_query(&self.current)
    }
}

/// Trim a generated line and drop list markers (`-`, `*`, `1.`, `2)`).
fn clean_query(line: &str) -> Option<String> {
    let mut query = line.trim();
    query = query.trim_start_matches(['-', '*', '•']).trim_start();

    let digits = query.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &query[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            query = stripped.trim_start();
        }
    }

    let query = query.trim_matches('"').trim();
    (!query.is_empty()).then(|| query.to_string())
}

/// What the grounding step hands every analyst.
#[derive(Debug, Clone)]
pub struct GroundingSnapshot {
    pub company: CompanyProfile,
    pub site_scrape: Option<String>,
    pub source: DocumentSource,
    pub progress: ProgressHandle,
}

/// Output of one successful analyst task.
#[derive(Debug, Clone)]
pub struct AnalystReport {
    pub category: Category,
    pub queries: Vec<String>,
    pub documents: DocumentMap,
    /// `None` when the category found no documents.
    pub briefing: Option<String>,
}

/// Shared dependencies of the analyst tasks.
pub struct AnalystRunner {
    pub queries_llm: Arc<dyn LLMClient>,
    pub briefing_llm: Arc<dyn LLMClient>,
    pub retriever: Retriever,
    pub citations: CitationConfig,
    pub matcher: Arc<dyn FactMatcher>,
    pub max_queries: usize,
    pub timeout: Duration,
    pub briefing_doc_chars: usize,
}

impl AnalystRunner {
    pub async fn run(&self, analyst: &dyn Analyst, snapshot: &GroundingSnapshot) -> Result<AnalystReport> {
        let category = analyst.category();
        let progress = &snapshot.progress;
        let timer = OpTimer::new("analyst", category.as_str());

        let queries = with_timeout(
            "query generation",
            self.timeout,
            self.generate_queries(analyst, &snapshot.company, progress),
        )
        .await?;
        if queries.is_empty() {
            return Err(AppError::LLM(format!(
                "No queries generated for {} ({})",
                snapshot.company.name, category
            )));
        }
        info!(job_id = %progress.job_id(), %category, queries = ?queries, "Generated queries");
        progress.emit_result(
            ProgressStatus::QueriesGenerated,
            format!("Generated {} queries for {}", queries.len(), category.analyst_name()),
            json!({
                "category": category.analyst_name(),
                "queries": queries,
                "total_queries": queries.len(),
            }),
        );

        let mut documents = DocumentMap::new();
        if analyst.includes_site_scrape() {
            if let (Some(scrape), Some(url)) = (&snapshot.site_scrape, &snapshot.company.url) {
                documents.insert(
                    url.clone(),
                    Document {
                        url: url.clone(),
                        title: snapshot.company.name.clone(),
                        content: scrape.clone(),
                        query: format!(
                            "Company overview and information about {}",
                            snapshot.company.name
                        ),
                        source: snapshot.source,
                        score: 0.0,
                    },
                );
            }
        }

        let retrieved = self
            .retriever
            .retrieve(&snapshot.company.name, &queries, analyst.search_topic(), category, progress)
            .await?;
        documents.extend(retrieved);

        let briefing = write_briefing(
            self.briefing_llm.as_ref(),
            category,
            &snapshot.company,
            &documents,
            self.briefing_doc_chars,
            self.timeout,
        )
        .await?;

        let preview = briefing.as_deref().map(|text| {
            let mut engine = CitationEngine::new(self.matcher.clone(), &self.citations);
            engine.register_documents(documents.values());
            (engine.annotate(text), engine.references_section())
        });

        progress.emit_result(
            ProgressStatus::CategoryComplete,
            format!("{} research complete", category.heading()),
            json!({
                "category": category,
                "analyst": category.analyst_name(),
                "queries": queries,
                "documents": documents.len(),
                "briefing": preview.as_ref().map(|(text, _)| text),
                "references": preview.as_ref().map(|(_, refs)| refs),
            }),
        );
        timer.finish();

        Ok(AnalystReport {
            category,
            queries,
            documents,
            briefing,
        })
    }

    async fn generate_queries(
        &self,
        analyst: &dyn Analyst,
        company: &CompanyProfile,
        progress: &ProgressHandle,
    ) -> Result<Vec<String>> {
        let category = analyst.category();
        let system = format!(
            "You are researching {}, a company in the {} industry.",
            company.name,
            company.industry_or_unknown()
        );
        let prompt = format!(
            "Researching {} on {}.\n{}\n\n\
             Important Guidelines:\n\
             - Focus ONLY on {}-specific information\n\
             - Make queries very brief and to the point\n\
             - Provide exactly {} search queries (one per line), with no hyphens or dashes\n\
             - DO NOT make assumptions about the industry - use only the provided industry information",
            company.name,
            chrono::Utc::now().format("%B %d, %Y"),
            analyst.query_focus(company),
            company.name,
            self.max_queries,
        );

        progress.emit_result(
            ProgressStatus::QueryGenerationStarted,
            format!("Generating queries for {}", category.analyst_name()),
            json!({
                "category": category.analyst_name(),
                "max_queries": self.max_queries,
            }),
        );
        let mut stream = self.queries_llm.stream_with_system(&system, &prompt).await?;
        let mut parser = QueryParser::new();
        let mut queries: Vec<String> = Vec::new();

        while let Some(delta) = stream.next().await {
            let delta = delta?;
            let completed = parser.push(&delta);

            if !parser.partial().trim().is_empty() {
                progress.emit_result(
                    ProgressStatus::QueryGenerating,
                    "Generating research query",
                    json!({
                        "query": parser.partial(),
                        "query_number": queries.len() + 1,
                        "category": category.analyst_name(),
                        "is_complete": false,
                    }),
                );
            }

            for query in completed {
                queries.push(query);
                announce(progress, category, &queries);
                if queries.len() >= self.max_queries {
                    debug!(%category, "Query cap reached, dropping the rest of the stream");
                    return Ok(queries);
                }
            }
        }

        if let Some(query) = parser.finish() {
            queries.push(query);
            announce(progress, category, &queries);
        }
        if queries.is_empty() {
            warn!(%category, company = %company.name, "Query generation produced nothing");
        }
        Ok(queries)
    }
}

fn announce(progress: &ProgressHandle, category: Category, queries: &[String]) {
    if let Some(query) = queries.last() {
        progress.emit_result(
            ProgressStatus::QueryGenerated,
            "Generated new research query",
            json!({
                "query": query,
                "query_number": queries.len(),
                "category": category.analyst_name(),
                "is_complete": true,
            }),
        );
    }
}
