//! Pattern catalog used to find citable spans in generated prose.
//!
//! The catalog is plain data: a list of named categories, each holding a few
//! regular expressions. Anything that can report byte spans can stand in for
//! it through [`FactMatcher`].

use crate::types::{AppError, Result};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;

/// A candidate span in the scanned text, as byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Hit {
    pub start: usize,
    pub end: usize,
}

/// Finds candidate factual spans in prose.
pub trait FactMatcher: Send + Sync {
    fn find_hits(&self, text: &str) -> Vec<Hit>;
}

const AMOUNT: &str = r"\$?\d[\d,]*(?:\.\d+)?(?:\s?(?:B|M|K|bn)\b)?(?:\s*(?:trillion|billion|million|thousand)\b)?(?:\s*(?:USD|EUR|dollars|euros)\b)?";
const PERIOD: &str = r"(?:Q[1-4]|quarter|year|fiscal year|FY)\b(?:\s*\d{4}\b)?";

fn builtin_categories() -> Vec<(&'static str, Vec<String>)> {
    vec![
        (
            "financial_metrics",
            vec![
                format!(
                    r"\b(?:revenue|sales|income|profit|earnings|ebitda|valuation|funding|loss)\s*(?:of|at|was|is|reached|totaled|rose to|fell to)?\s*{}(?:\s*(?:in|for|during)\b\s*{})?",
                    AMOUNT, PERIOD
                ),
                format!(
                    r"{}\s*(?:in|of|for)?\s*(?:revenue|sales|income|profit|earnings|funding)\b",
                    AMOUNT
                ),
                r"\$\d[\d,]*(?:\.\d+)?(?:\s?(?:B|M|K|bn)\b)?(?:\s*(?:trillion|billion|million|thousand)\b)?".to_string(),
                r"\b\d[\d,]*(?:\.\d+)?\s*(?:trillion|billion|million)\s*(?:USD|EUR|dollars|euros)\b".to_string(),
            ],
        ),
        (
            "percentages",
            vec![
                r"\b\d+(?:\.\d+)?\s?(?:%|percent\b)(?:\s*(?:increase|decrease|growth|decline|up|down)\b)?(?:\s*(?:in|of|for)\s*(?:revenue|sales|income|profit|earnings|market share)\b)?".to_string(),
                r"\b(?:market share|market value|market size|margin)\s*(?:of|is|was|at)?\s*\$?\d+(?:\.\d+)?\s?(?:%|percent\b|billion\b|million\b)?".to_string(),
            ],
        ),
        (
            "unit_counts",
            vec![
                r"\b\d[\d,]*(?:\.\d+)?(?:\s*(?:thousand|million|billion))?\s+(?:employees|customers|users|subscribers|stores|locations|offices|countries|markets|units|vehicles|cars|patents|products|partners)\b".to_string(),
                r"\b(?:sold|delivered|produced|shipped|employs|serves)\s+(?:over\s+|more than\s+|nearly\s+|about\s+)?\d[\d,]*(?:\.\d+)?(?:\s*(?:thousand|million|billion))?".to_string(),
            ],
        ),
        (
            "calendar",
            vec![
                r"\b(?:Q[1-4]|quarter|FY|fiscal year)\s*\d{4}\b".to_string(),
                r"\b(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:tember)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)\.?\s+(?:\d{1,2},\s*)?\d{4}\b".to_string(),
            ],
        ),
        (
            "company_events",
            vec![
                r"\b(?:announced|launched|introduced|released|acquired|partnered with|invested in|merged with)\s+[A-Z][\w&\-]*(?:\s+[A-Z][\w&\-]*){0,3}".to_string(),
                r"\b(?:founded|incorporated|headquartered|went public|IPO)\s+(?:in\s+)?\d{4}\b".to_string(),
            ],
        ),
        (
            "generic_numerics",
            vec![r"\b\d[\d,]*(?:\.\d+)?\b".to_string()],
        ),
    ]
}

/// A named set of patterns.
#[derive(Debug, Clone)]
pub struct PatternCategory {
    pub name: String,
    patterns: Vec<Regex>,
}

impl PatternCategory {
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

/// Regex-backed [`FactMatcher`].
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    categories: Vec<PatternCategory>,
}

fn compile(category: &str, pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| {
            AppError::Configuration(format!(
                "Invalid citation pattern in '{}': {}",
                category, e
            ))
        })
}

impl PatternCatalog {
    /// The built-in catalog: currency and financial figures, percentages,
    /// unit counts, calendar references, company events, generic numerics.
    pub fn builtin() -> Result<Self> {
        Self::with_extra(&BTreeMap::new())
    }

    /// Built-in catalog plus user categories. A user category with a
    /// built-in name adds to it.
    pub fn with_extra(extra: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut categories = Vec::new();
        for (name, patterns) in builtin_categories() {
            categories.push(PatternCategory {
                name: name.to_string(),
                patterns: patterns
                    .iter()
                    .map(|p| compile(name, p))
                    .collect::<Result<Vec<_>>>()?,
            });
        }

        for (name, patterns) in extra {
            let compiled = patterns
                .iter()
                .map(|p| compile(name, p))
                .collect::<Result<Vec<_>>>()?;
            match categories.iter_mut().find(|c| &c.name == name) {
                Some(existing) => existing.patterns.extend(compiled),
                None => categories.push(PatternCategory {
                    name: name.clone(),
                    patterns: compiled,
                }),
            }
        }

        Ok(Self { categories })
    }

    pub fn categories(&self) -> &[PatternCategory] {
        &self.categories
    }
}

impl FactMatcher for PatternCatalog {
    fn find_hits(&self, text: &str) -> Vec<Hit> {
        let mut hits: Vec<Hit> = self
            .categories
            .iter()
            .flat_map(|category| category.patterns.iter())
            .flat_map(|re| re.find_iter(text))
            .filter_map(|m| trim_span(text, m.start(), m.end()))
            .collect();

        hits.sort();
        hits.dedup();
        hits
    }
}

/// Shrink a span to exclude surrounding whitespace; `None` if nothing is left.
fn trim_span(text: &str, start: usize, end: usize) -> Option<Hit> {
    let slice = &text[start..end];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    if leading + trailing >= slice.len() {
        return None;
    }
    Some(Hit {
        start: start + leading,
        end: end - trailing,
    })
}
