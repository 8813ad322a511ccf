use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============= Research Categories =============

/// A research dimension owned by exactly one analyst.
///
/// The declaration order is the order sections appear in the compiled report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Company,
    Industry,
    Financial,
    News,
}

impl Category {
    /// All categories in report order.
    pub const ALL: [Category; 4] = [
        Category::Company,
        Category::Industry,
        Category::Financial,
        Category::News,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Company => "company",
            Category::Industry => "industry",
            Category::Financial => "financial",
            Category::News => "news",
        }
    }

    /// The `##` heading this category compiles into.
    pub fn heading(&self) -> &'static str {
        match self {
            Category::Company => "Company Overview",
            Category::Industry => "Industry Overview",
            Category::Financial => "Financial Overview",
            Category::News => "News",
        }
    }

    /// Name of the analyst that owns this category, used in progress events.
    pub fn analyst_name(&self) -> &'static str {
        match self {
            Category::Company => "company_analyst",
            Category::Industry => "industry_analyst",
            Category::Financial => "financial_analyst",
            Category::News => "news_analyst",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "company" => Ok(Category::Company),
            "industry" => Ok(Category::Industry),
            "financial" | "finance" => Ok(Category::Financial),
            "news" => Ok(Category::News),
            other => Err(AppError::InvalidInput(format!("Unknown category: {}", other))),
        }
    }
}

// ============= Documents =============

/// Where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    /// Served from the fixture store.
    Local,
    /// Fetched from the remote search service.
    Remote,
}

impl DocumentSource {
    /// Same spelling as the serialized tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentSource::Local => "local",
            DocumentSource::Remote => "remote",
        }
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retrieved source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub content: String,
    /// The query that retrieved this document.
    pub query: String,
    pub source: DocumentSource,
    #[serde(default)]
    pub score: f32,
}

impl Document {
    pub fn from_hit(hit: SearchHit, query: &str, source: DocumentSource) -> Self {
        Self {
            url: hit.url,
            title: hit.title,
            content: hit.content,
            query: query.to_string(),
            source,
            score: hit.score,
        }
    }
}

/// Documents of one category keyed by url.
pub type DocumentMap = BTreeMap<String, Document>;

/// One ranked result from the search service or the fixture store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: f32,
}

// ============= Company Input =============

/// Identity of the company being researched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hq: Option<String>,
}

impl CompanyProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }

    pub fn with_hq(mut self, hq: impl Into<String>) -> Self {
        self.hq = Some(hq.into());
        self
    }

    pub fn industry_or_unknown(&self) -> &str {
        self.industry.as_deref().unwrap_or("Unknown")
    }

    pub fn hq_or_unknown(&self) -> &str {
        self.hq.as_deref().unwrap_or("Unknown")
    }

    /// Reject profiles the pipeline cannot research.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Company name must not be empty".to_string(),
            ));
        }
        if let Some(url) = &self.url {
            url::Url::parse(url)
                .map_err(|e| AppError::InvalidInput(format!("Invalid company url '{}': {}", url, e)))?;
        }
        Ok(())
    }
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("Compilation error: {0}")]
    Compilation(String),

    #[error("Citation matching error: {0}")]
    Matching(String),

    #[error("Fixture store error: {0}")]
    FixtureStore(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Failures of external calls and per-paragraph matching are contained at
    /// the query, category or paragraph level; everything else is fatal to
    /// the operation that raised it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::LLM(_)
                | AppError::Search(_)
                | AppError::Timeout { .. }
                | AppError::Matching(_)
                | AppError::FixtureStore(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
