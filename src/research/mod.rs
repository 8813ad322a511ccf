//! Company research pipeline
//!
//! Turns a company name into a cited, four-section report:
//!
//! 1. **Grounding** - extract the company homepage once ([`grounding`])
//! 2. **Research** - four analysts run concurrently, each generating search
//!    queries, retrieving documents and writing a category briefing
//!    ([`analyst`], [`retriever`], [`briefing`])
//! 3. **Compilation** - the editor merges the briefings in two passes and
//!    links citations ([`editor`], [`report`])
//!
//! [`orchestrator::ResearchPipeline`] sequences the phases and emits
//! [`state::StatePatch`]es; progress goes out through [`progress`].
//!
//! # Usage
//!
//! ```ignore
//! use company_research::research::ResearchPipeline;
//!
//! let pipeline = ResearchPipeline::from_config(&config)?;
//! let state = pipeline
//!     .run_to_state(CompanyProfile::new("Acme").with_url("https://acme.example"), "job-1")
//!     .await;
//! println!("{}", state.report.unwrap_or_default());
//! ```

pub mod analyst;
pub mod briefing;
pub mod editor;
pub mod grounding;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod retriever;
pub mod state;

pub use analyst::{default_analysts, Analyst, AnalystReport, AnalystRunner, QueryParser};
pub use editor::Editor;
pub use orchestrator::{ResearchPipeline, StageClients};
pub use progress::{
    BroadcastProgress, NoopProgress, ProgressHandle, ProgressSink, ProgressStatus, ProgressUpdate,
};
pub use state::{Phase, ResearchState, StatePatch};
