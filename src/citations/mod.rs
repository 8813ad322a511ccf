//! Citation linking for generated prose.
//!
//! Sources are split into fact units; prose is scanned with a
//! [`FactMatcher`]; every matched span that appears verbatim in a fact unit
//! gets a numbered mark, and [`CitationEngine::references_section`] renders
//! the numbered source list.
//!
//! ```ignore
//! let mut engine = CitationEngine::from_config(&config.citations)?;
//! engine.register_documents(documents.values());
//! let cited = engine.annotate(&draft);
//! let report = format!("{}\n\n{}", cited, engine.references_section());
//! ```

pub mod engine;
pub mod facts;
pub mod patterns;
pub mod registry;

pub use engine::CitationEngine;
pub use facts::FactUnit;
pub use patterns::{FactMatcher, Hit, PatternCatalog};
pub use registry::ReferenceRegistry;

use serde::{Deserialize, Serialize};

/// How citation marks are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    /// `<sup>[1][2]</sup>`
    #[default]
    Superscript,
    /// `[1][2]`
    Bracket,
    /// `[^1][^2]`
    Footnote,
}

impl CitationStyle {
    pub fn render(&self, numbers: &[usize]) -> String {
        let groups: String = numbers
            .iter()
            .map(|n| match self {
                CitationStyle::Footnote => format!("[^{}]", n),
                _ => format!("[{}]", n),
            })
            .collect();

        match self {
            CitationStyle::Superscript => format!("<sup>{}</sup>", groups),
            _ => groups,
        }
    }
}
