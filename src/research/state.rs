use super::progress::ProgressHandle;
use crate::types::{Category, CompanyProfile, DocumentMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Pipeline phase, advanced by the orchestrator at each boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Init,
    Grounding,
    Researching,
    Compiling,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

/// The record threaded through one research job.
///
/// Each category's document map is written once by its analyst; briefings
/// derive from documents and the report from briefings.
#[derive(Debug, Clone)]
pub struct ResearchState {
    pub job_id: String,
    pub company: CompanyProfile,
    pub phase: Phase,
    /// Homepage text from grounding, if any.
    pub site_scrape: Option<String>,
    /// Grounding failures are recorded here and never stop the job.
    pub grounding_error: Option<String>,
    pub documents: BTreeMap<Category, DocumentMap>,
    pub briefings: BTreeMap<Category, String>,
    pub report: Option<String>,
    /// Same content as `report`, kept for consumers reading the editor slot.
    pub editor_report: Option<String>,
    pub error: Option<String>,
    pub messages: Vec<String>,
    pub progress: ProgressHandle,
}

impl ResearchState {
    pub fn new(company: CompanyProfile, progress: ProgressHandle) -> Self {
        Self {
            job_id: progress.job_id().to_string(),
            company,
            phase: Phase::Init,
            site_scrape: None,
            grounding_error: None,
            documents: BTreeMap::new(),
            briefings: BTreeMap::new(),
            report: None,
            editor_report: None,
            error: None,
            messages: Vec::new(),
            progress,
        }
    }

    /// Fold a patch in with per-key overwrite.
    ///
    /// A category document map that is already present is kept; a second
    /// write is dropped with a warning.
    pub fn apply(&mut self, patch: StatePatch) {
        if let Some(phase) = patch.phase {
            self.phase = phase;
        }
        if let Some(scrape) = patch.site_scrape {
            self.site_scrape = Some(scrape);
        }
        if let Some(error) = patch.grounding_error {
            self.grounding_error = Some(error);
        }
        for (category, docs) in patch.documents {
            if self.documents.contains_key(&category) {
                warn!(job_id = %self.job_id, %category, "Ignoring second write to category documents");
                continue;
            }
            self.documents.insert(category, docs);
        }
        self.briefings.extend(patch.briefings);
        if let Some(report) = patch.report {
            self.report = Some(report);
        }
        if let Some(report) = patch.editor_report {
            self.editor_report = Some(report);
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }
        self.messages.extend(patch.messages);
    }

    pub fn document_count(&self) -> usize {
        self.documents.values().map(|docs| docs.len()).sum()
    }
}

/// A partial update produced by one pipeline step. Unset fields leave the
/// state untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub phase: Option<Phase>,
    pub site_scrape: Option<String>,
    pub grounding_error: Option<String>,
    pub documents: BTreeMap<Category, DocumentMap>,
    pub briefings: BTreeMap<Category, String>,
    pub report: Option<String>,
    pub editor_report: Option<String>,
    pub error: Option<String>,
    pub messages: Vec<String>,
}

impl StatePatch {
    pub fn phase(phase: Phase) -> Self {
        Self {
            phase: Some(phase),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            phase: Some(Phase::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }
}
