//! File-backed fixture store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<company_key>/<query_key>.json   search results, url -> {title, content, score}
//! <root>/<domain_key>_site.json           homepage extraction, {"raw_content": "..."}
//! ```
//!
//! Keys are normalized with [`normalize_key`] so the same (company, query)
//! pair always lands on the same file. Writes replace the whole file; when two
//! analysts race on one key the last writer wins.

use crate::types::{AppError, Result, SearchHit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lowercase, collapse everything that is not ASCII alphanumeric into `_`.
///
/// Empty input maps to `unknown`.
pub fn normalize_key(raw: &str) -> String {
    let key: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if key.is_empty() {
        "unknown".to_string()
    } else {
        key
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FixtureEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct SiteFixture {
    raw_content: String,
}

#[derive(Debug, Clone)]
pub struct FixtureStore {
    root: PathBuf,
}

impl FixtureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn query_path(&self, company: &str, query: &str) -> PathBuf {
        self.root
            .join(normalize_key(company))
            .join(format!("{}.json", normalize_key(query)))
    }

    /// Fixture path for the homepage of `url`, keyed by its host.
    pub fn site_path(&self, url: &str) -> PathBuf {
        let domain = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string());
        self.root
            .join(format!("{}_site.json", normalize_key(&domain)))
    }

    /// Cached hits for (company, query), `None` when no fixture exists.
    pub async fn lookup(&self, company: &str, query: &str) -> Result<Option<Vec<SearchHit>>> {
        let path = self.query_path(company, query);
        let Some(raw) = read_if_exists(&path).await? else {
            debug!(path = %path.display(), "No fixture for query");
            return Ok(None);
        };

        let entries: BTreeMap<String, FixtureEntry> = serde_json::from_str(&raw).map_err(|e| {
            AppError::FixtureStore(format!("Malformed fixture {}: {}", path.display(), e))
        })?;

        let mut hits: Vec<SearchHit> = entries
            .into_iter()
            .map(|(url, entry)| SearchHit {
                url,
                title: entry.title,
                content: entry.content,
                score: entry.score,
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(path = %path.display(), hits = hits.len(), "Fixture hit");
        Ok(Some(hits))
    }

    /// Write-through for remote results. Later hits with the same url win.
    pub async fn store(&self, company: &str, query: &str, hits: &[SearchHit]) -> Result<()> {
        let path = self.query_path(company, query);
        let entries: BTreeMap<&str, FixtureEntry> = hits
            .iter()
            .map(|hit| {
                (
                    hit.url.as_str(),
                    FixtureEntry {
                        title: hit.title.clone(),
                        content: hit.content.clone(),
                        score: hit.score,
                    },
                )
            })
            .collect();

        let body = serde_json::to_string_pretty(&entries)?;
        write_file(&path, body).await?;
        debug!(path = %path.display(), entries = entries.len(), "Stored fixture");
        Ok(())
    }

    /// Cached homepage extraction for `url`.
    pub async fn site_extraction(&self, url: &str) -> Result<Option<String>> {
        let path = self.site_path(url);
        let Some(raw) = read_if_exists(&path).await? else {
            return Ok(None);
        };

        let site: SiteFixture = serde_json::from_str(&raw).map_err(|e| {
            AppError::FixtureStore(format!("Malformed site fixture {}: {}", path.display(), e))
        })?;
        Ok(Some(site.raw_content))
    }

    pub async fn store_site_extraction(&self, url: &str, raw_content: &str) -> Result<()> {
        let path = self.site_path(url);
        let body = serde_json::to_string_pretty(&SiteFixture {
            raw_content: raw_content.to_string(),
        })?;
        write_file(&path, body).await
    }
}

async fn read_if_exists(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read fixture");
            Err(AppError::FixtureStore(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    }
}

async fn write_file(path: &Path, body: String) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            AppError::FixtureStore(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    tokio::fs::write(path, body)
        .await
        .map_err(|e| AppError::FixtureStore(format!("Failed to write {}: {}", path.display(), e)))
}
