//! # company-research
//!
//! Multi-analyst company research: four analysts (company, industry,
//! financials, news) research a company in parallel, an editor compiles their
//! briefings into one markdown report, and a citation engine links every
//! figure in the report back to the documents it came from.
//!
//! ## Overview
//!
//! company-research can be used in two ways:
//!
//! 1. **As a command-line tool** - Run the `company-research` binary
//! 2. **As a library** - Embed the pipeline in your own Rust project
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use company_research::{CompanyProfile, ResearchConfig, ResearchPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ResearchConfig::load("research.toml")?;
//!     let pipeline = ResearchPipeline::from_config(&config)?;
//!
//!     let company = CompanyProfile::new("Acme Corp").with_url("https://acme.example");
//!     let state = pipeline.run_to_state(company, "job-1").await;
//!     println!("{}", state.report.unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ### Background jobs
//!
//! ```rust,ignore
//! use company_research::jobs::JobManager;
//! use std::sync::Arc;
//!
//! let manager = JobManager::new(Arc::new(pipeline));
//! let job_id = manager.start(CompanyProfile::new("Acme Corp")).await?;
//! // ... later
//! let record = manager.status(&job_id)?;
//! ```
//!
//! ### Citations on their own
//!
//! ```rust,ignore
//! use company_research::citations::CitationEngine;
//!
//! let mut engine = CitationEngine::from_config(&config.citations)?;
//! engine.register_source(url, title, content, 0.9);
//! let cited = engine.annotate(text);
//! let references = engine.references_section();
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference |
//!
//! The OpenAI-compatible client (OpenAI, OpenRouter, self-hosted gateways)
//! is always available.
//!
//! ## Modules
//!
//! - [`research`] - State machine, analysts, grounding and editor
//! - [`citations`] - Fact matching and reference numbering
//! - [`llm`] - Completion clients
//! - [`search`] - Web search backends
//! - [`fixtures`] - File-backed search fixtures for offline runs
//! - [`jobs`] - Job records and background execution
//! - [`types`] - Common types and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Citation linking: fact patterns, reference numbering, annotation.
pub mod citations;
/// Command-line surface of the `company-research` binary.
pub mod cli;
/// File-backed fixture store for search results and site extractions.
pub mod fixtures;
/// Job records, background execution and persistence.
pub mod jobs;
/// LLM provider clients and abstractions.
pub mod llm;
/// The research pipeline.
pub mod research;
/// Web search and page extraction backends.
pub mod search;
/// Core types and errors.
pub mod types;
/// Configuration, logging and async helpers.
pub mod utils;

// Re-export commonly used types
pub use citations::{CitationEngine, CitationStyle};
pub use jobs::{JobManager, JobRecord, JobStatus};
pub use llm::{LLMClient, LLMClientFactory, Provider};
pub use research::{ResearchPipeline, ResearchState, StageClients, StatePatch};
pub use search::SearchProvider;
pub use types::{AppError, Category, CompanyProfile, Result};
pub use utils::toml_config::ResearchConfig;
