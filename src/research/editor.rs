//! Two-pass report compilation.
//!
//! Pass 1 merges the category briefings into a draft. Pass 2 re-prompts the
//! model to enforce the four-section outline without touching citation
//! marks. The citation engine runs after each pass, and the outline
//! normalizer has the last word on structure.

use super::progress::{ProgressHandle, ProgressStatus};
use super::report::normalize_outline;
use super::state::{Phase, ResearchState, StatePatch};
use crate::citations::{CitationEngine, FactMatcher};
use crate::llm::LLMClient;
use crate::types::{AppError, Category, CompanyProfile, Result};
use crate::utils::logging::OpTimer;
use crate::utils::toml_config::CitationConfig;
use crate::utils::with_timeout;
use futures::StreamExt;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const COMPILE_SYSTEM: &str =
    "You are an expert report editor that compiles research briefings into comprehensive company reports.";
const SWEEP_SYSTEM: &str = "You are an expert markdown formatter that ensures consistent document structure. \
     Never modify citation marks such as <sup>[1]</sup>.";

/// Minimum buffered length before a `report_chunk` update is sent.
const CHUNK_MIN_CHARS: usize = 10;

pub struct Editor {
    compile_llm: Arc<dyn LLMClient>,
    sweep_llm: Arc<dyn LLMClient>,
    matcher: Arc<dyn FactMatcher>,
    citations: CitationConfig,
    timeout: Duration,
}

fn compile_prompt(company: &CompanyProfile, briefings: &BTreeMap<Category, String>) -> String {
    let briefing = |category: Category| {
        briefings
            .get(&category)
            .cloned()
            .unwrap_or_else(|| format!("No {} briefing available", category.as_str()))
    };

    format!(
        "You are an expert report editor tasked with compiling a comprehensive research report for {company}.\n\n\
         Please compile the following research briefings into a cohesive report:\n\n\
         COMPANY BRIEFING:\n{}\n\n\
         INDUSTRY BRIEFING:\n{}\n\n\
         FINANCIAL BRIEFING:\n{}\n\n\
         NEWS BRIEFING:\n{}\n\n\
         Please follow these guidelines:\n\
         1. Create a well-structured report with clear sections and subsections\n\
         2. Maintain all factual information and data points\n\
         3. Ensure smooth transitions between sections\n\
         4. Remove any redundant information\n\
         5. Keep the tone professional and objective\n\
         6. Include all relevant metrics and statistics\n\
         7. Format the report in markdown\n\n\
         The report should follow this structure:\n\
         # {company} Research Report\n\n\
         ## Company Overview\n[Company information, history, business model, etc.]\n\n\
         ## Industry Overview\n[Industry analysis, market trends, competitive landscape]\n\n\
         ## Financial Overview\n[Financial performance, key metrics, analysis]\n\n\
         ## News\n[Recent developments, significant events]\n\n\
         Please compile the report now, ensuring all information is accurate and well-organized.",
        briefing(Category::Company),
        briefing(Category::Industry),
        briefing(Category::Financial),
        briefing(Category::News),
        company = company.name,
    )
}

fn sweep_prompt(company: &CompanyProfile, draft: &str) -> String {
    format!(
        "You are an expert briefing editor. You are given a report on {company}.\n\n\
         Current report:\n{draft}\n\n\
         1. Remove redundant or repetitive information\n\
         2. Remove information that is not relevant to {company}, the {industry} company headquartered in {hq}.\n\
         3. Remove sections lacking substantial content\n\
         4. Remove any meta-commentary (e.g. \"Here is the news...\")\n\
         5. DO NOT modify any citation marks such as <sup>[1]</sup>; they must survive verbatim\n\n\
         Strictly enforce this EXACT document structure:\n\n\
         # {company} Research Report\n\n\
         ## Company Overview\n[Company content with ### subsections]\n\n\
         ## Industry Overview\n[Industry content with ### subsections]\n\n\
         ## Financial Overview\n[Financial content with ### subsections]\n\n\
         ## News\n[News content as * bullet points]\n\n\
         Critical rules:\n\
         1. The document MUST start with \"# {company} Research Report\"\n\
         2. The document MUST ONLY use these exact ## headers in this order:\n   \
            - ## Company Overview\n   - ## Industry Overview\n   - ## Financial Overview\n   - ## News\n\
         3. NO OTHER ## HEADERS ARE ALLOWED\n\
         4. Use ### for subsections in Company/Industry/Financial sections\n\
         5. News section should only use bullet points (*), never headers\n\
         6. Never use code blocks (```)\n\
         7. Never use more than one blank line between sections\n\
         8. Format all bullet points with *\n\
         9. Add one blank line before and after each section/list\n\
         10. DO NOT modify any citation marks\n\
         11. DO NOT remove or modify any data points that carry citation marks\n\n\
         Return the polished report in flawless markdown format. No explanation.",
        company = company.name,
        draft = draft,
        industry = company.industry_or_unknown(),
        hq = company.hq_or_unknown(),
    )
}

impl Editor {
    pub fn new(
        compile_llm: Arc<dyn LLMClient>,
        sweep_llm: Arc<dyn LLMClient>,
        matcher: Arc<dyn FactMatcher>,
        citations: CitationConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            compile_llm,
            sweep_llm,
            matcher,
            citations,
            timeout,
        }
    }

    /// Compile the briefings in `state` into the final report.
    ///
    /// Fails with [`AppError::Compilation`] when there is no briefing to
    /// compile or the first pass returns nothing. A failed or empty second
    /// pass falls back to the first-pass draft.
    pub async fn compile(&self, state: &ResearchState) -> Result<StatePatch> {
        if state.briefings.values().all(|b| b.trim().is_empty()) {
            return Err(AppError::Compilation(
                "No valid briefings available for compilation".to_string(),
            ));
        }
        let progress = &state.progress;
        let company = &state.company;

        let mut engine = CitationEngine::new(self.matcher.clone(), &self.citations);
        engine.reset();
        for docs in state.documents.values() {
            engine.register_documents(docs.values());
        }
        info!(
            job_id = %state.job_id,
            briefings = state.briefings.len(),
            facts = engine.fact_count(),
            "Compiling report"
        );

        progress.emit(ProgressStatus::Compiling, "Compiling research briefings");
        let timer = OpTimer::new("editor", "compile");
        let draft = with_timeout(
            "report compilation",
            self.timeout,
            self.compile_llm
                .generate_with_system(COMPILE_SYSTEM, &compile_prompt(company, &state.briefings)),
        )
        .await;
        timer.finish_with_result(draft.as_ref());

        let draft = draft.map_err(|e| AppError::Compilation(format!("Report compilation failed: {}", e)))?;
        let draft = draft.trim();
        if draft.is_empty() {
            return Err(AppError::Compilation(
                "Report compilation returned no content".to_string(),
            ));
        }
        let draft = engine.annotate(draft);

        progress.emit(ProgressStatus::Compiling, "Formatting final report");
        let timer = OpTimer::new("editor", "sweep");
        let swept = with_timeout(
            "report sweep",
            self.timeout,
            self.sweep(company, &draft, progress),
        )
        .await;
        timer.finish_with_result(swept.as_ref());

        let swept = match swept {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(job_id = %state.job_id, "Sweep pass returned nothing, keeping the draft");
                draft
            }
            Err(e) => {
                warn!(job_id = %state.job_id, error = %e, "Sweep pass failed, keeping the draft");
                draft
            }
        };

        let body = engine.annotate(&normalize_outline(&company.name, swept.trim()));
        // the sweep may have dropped cited sentences
        let body = engine.renumber_cited(&body);
        let references = engine.references_section();
        let report = if references.is_empty() {
            body
        } else {
            format!("{}\n\n{}", body, references.trim_end())
        };

        info!(
            job_id = %state.job_id,
            chars = report.len(),
            references = engine.registry().len(),
            "Report compiled"
        );

        Ok(StatePatch {
            phase: Some(Phase::Done),
            report: Some(report.clone()),
            editor_report: Some(report),
            ..Default::default()
        }
        .with_message(format!("Compiled report for {}", company.name)))
    }

    async fn sweep(&self, company: &CompanyProfile, draft: &str, progress: &ProgressHandle) -> Result<String> {
        let mut stream = self
            .sweep_llm
            .stream_with_system(SWEEP_SYSTEM, &sweep_prompt(company, draft))
            .await?;

        let mut text = String::new();
        let mut buffer = String::new();
        while let Some(delta) = stream.next().await {
            let delta = delta?;
            text.push_str(&delta);
            buffer.push_str(&delta);

            if buffer.len() > CHUNK_MIN_CHARS && buffer.contains(['.', '!', '?', '\n']) {
                emit_chunk(progress, std::mem::take(&mut buffer));
            }
        }
        if !buffer.is_empty() {
            emit_chunk(progress, buffer);
        }
        Ok(text)
    }
}

fn emit_chunk(progress: &ProgressHandle, chunk: String) {
    progress.emit_result(
        ProgressStatus::ReportChunk,
        "Formatting final report",
        json!({ "chunk": chunk, "step": "Editor" }),
    );
}
