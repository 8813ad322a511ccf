use crate::llm::LLMClient;
use crate::types::{Category, CompanyProfile, DocumentMap, Result};
use crate::utils::with_timeout;
use std::time::Duration;
use tracing::{debug, warn};

fn briefing_focus(category: Category) -> &'static str {
    match category {
        Category::Company => {
            "Cover the core products and services, company history and milestones, \
             leadership team, and business model and strategy."
        }
        Category::Industry => {
            "Cover the market position, main competitors, industry trends and challenges, \
             and market size and growth."
        }
        Category::Financial => {
            "Cover fundraising history and valuation, key financial metrics, \
             and revenue and profit sources. Keep every figure exactly as the sources state it."
        }
        Category::News => {
            "List the most recent announcements, press releases and partnerships \
             as bullet points, newest first."
        }
    }
}

/// Condense a category's documents into its briefing.
///
/// Documents go in best score first, each cut to `doc_chars` characters.
/// Returns `None` for an empty category or an empty completion.
pub async fn write_briefing(
    llm: &dyn LLMClient,
    category: Category,
    company: &CompanyProfile,
    documents: &DocumentMap,
    doc_chars: usize,
    timeout: Duration,
) -> Result<Option<String>> {
    if documents.is_empty() {
        debug!(%category, "No documents, skipping briefing");
        return Ok(None);
    }

    let mut ranked: Vec<_> = documents.values().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    let sources = ranked
        .iter()
        .map(|doc| {
            let content: String = doc.content.chars().take(doc_chars).collect();
            format!("Title: {}\nURL: {}\nContent: {}", doc.title, doc.url, content)
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    let system = format!(
        "You are an expert {} analyst writing a research briefing.",
        category.as_str()
    );
    let prompt = format!(
        "Write the {} briefing for {}, a company in the {} industry headquartered in {}.\n\
         {}\n\n\
         Use only facts found in the sources below and keep numbers, dates and names verbatim. \
         Do not add a title or any meta-commentary.\n\n\
         Sources:\n\n{}",
        category.heading(),
        company.name,
        company.industry_or_unknown(),
        company.hq_or_unknown(),
        briefing_focus(category),
        sources
    );

    let text = with_timeout("briefing", timeout, llm.generate_with_system(&system, &prompt)).await?;
    let text = text.trim();
    if text.is_empty() {
        warn!(%category, "Briefing completion was empty");
        return Ok(None);
    }
    Ok(Some(text.to_string()))
}
