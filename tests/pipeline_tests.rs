//! End-to-end pipeline tests with scripted completion and search backends.

mod common;

use common::mocks::{hit, MockLLMClient, MockSearch};
use company_research::jobs::{InMemoryDocumentStore, JobManager, JobStatus, DocumentStore};
use company_research::llm::LLMClient;
use company_research::research::{
    BroadcastProgress, Phase, ProgressStatus, ResearchPipeline, StageClients, StatePatch,
};
use company_research::search::SearchProvider;
use company_research::types::{Category, CompanyProfile, DocumentSource};
use company_research::utils::toml_config::{ResearchConfig, RetrievalMode};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const COMPANY_BRIEFING: &str = "Acme Corp was founded in 2009 in Springfield. \
     The company employs 1,200 people across five offices.";
const FINANCIAL_BRIEFING: &str = "Acme reported revenue of $45 million in 2024.";

fn report_text() -> String {
    format!(
        "# Acme Research Report\n\n\
         ## Company Overview\n\n{}\n\n\
         ## Industry Overview\n\n\
         ## Financial Overview\n\n{}\n\n\
         ## News\n",
        COMPANY_BRIEFING, FINANCIAL_BRIEFING
    )
}

fn test_config(fixture_dir: &Path, mode: RetrievalMode) -> ResearchConfig {
    let mut config = ResearchConfig::default();
    config.research.fixture_dir = fixture_dir.to_path_buf();
    config.research.mode = mode;
    config.research.request_timeout_secs = 5;
    config
}

/// Completion script for a run where only company and financial searches
/// return documents.
fn scripted_llm() -> MockLLMClient {
    let report = report_text();
    MockLLMClient::new("")
        .on("expert markdown formatter", &report)
        .on("compiles research briefings", &report)
        .on("expert company analyst", COMPANY_BRIEFING)
        .on("expert financial analyst", FINANCIAL_BRIEFING)
        .on("expert industry analyst", "Acme competes with larger automation vendors.")
        .on("expert news analyst", "* Acme opened a new office in Springfield.")
        .on("company fundamentals", "Acme products\nAcme history\nAcme leadership")
        .on("industry analysis of", "Acme competitors")
        .on("financial analysis of", "Acme revenue\nAcme funding")
        .on("recent news coverage", "Acme announcements")
}

fn scripted_search() -> MockSearch {
    MockSearch::new()
        .on(
            "products",
            vec![hit(
                "https://acme.example/products",
                "Acme Products",
                "Acme Corp was founded in 2009 in Springfield. It sells industrial robots to factories worldwide.",
                0.9,
            )],
        )
        .on(
            "history",
            vec![hit(
                "https://news.example/acme-history",
                "Acme history",
                "The company employs 1,200 people across five offices. Its first robot shipped two years after launch.",
                0.8,
            )],
        )
        .on(
            "leadership",
            vec![hit(
                "https://people.example/acme-leadership",
                "Acme leadership",
                "Jane Doe has led Acme as chief executive since the company opened its doors.",
                0.7,
            )],
        )
        .on(
            "revenue",
            vec![hit(
                "https://finance.example/acme-revenue",
                "Acme revenue",
                "Acme reported revenue of $45 million in 2024 according to its annual filing.",
                0.95,
            )],
        )
        .on(
            "funding",
            vec![hit(
                "https://finance.example/acme-funding",
                "Acme funding",
                "Acme raised funding of $12 million from venture investors last spring.",
                0.6,
            )],
        )
}

fn pipeline(
    llm: &Arc<MockLLMClient>,
    search: Option<&Arc<MockSearch>>,
    config: &ResearchConfig,
) -> ResearchPipeline {
    let llm: Arc<dyn LLMClient> = llm.clone();
    let search = search.map(|s| s.clone() as Arc<dyn SearchProvider>);
    ResearchPipeline::new(StageClients::uniform(llm), search, config).unwrap()
}

fn heading_positions(report: &str) -> Vec<usize> {
    [
        "# Acme Research Report",
        "## Company Overview",
        "## Industry Overview",
        "## Financial Overview",
        "## News",
    ]
    .iter()
    .map(|h| report.find(h).unwrap_or_else(|| panic!("missing heading {}", h)))
    .collect()
}

#[tokio::test]
async fn test_partial_categories_compile_to_four_heading_skeleton() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let llm = Arc::new(scripted_llm());
    let search = Arc::new(scripted_search());

    let state = pipeline(&llm, Some(&search), &config)
        .run_to_state(CompanyProfile::new("Acme"), "job-skeleton")
        .await;

    assert_eq!(state.phase, Phase::Done, "error: {:?}", state.error);
    assert_eq!(state.documents[&Category::Company].len(), 3);
    assert_eq!(state.documents[&Category::Financial].len(), 2);
    assert!(state.documents[&Category::Industry].is_empty());
    assert!(state.documents[&Category::News].is_empty());
    assert_eq!(
        state.briefings.keys().copied().collect::<Vec<_>>(),
        vec![Category::Company, Category::Financial]
    );

    let report = state.report.clone().unwrap();
    let positions = heading_positions(&report);
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", report);
    assert!(report.contains("## Industry Overview\n\n## Financial Overview"));
    assert!(report.contains("## News\n\n## References"));
    assert_eq!(state.editor_report, state.report);

    // figures link back to the documents they came from
    assert!(report.contains("<sup>["));
    assert!(report.contains("https://acme.example/products"));
    assert!(report.contains("https://finance.example/acme-revenue"));
    assert!(!report.contains("https://people.example/acme-leadership"));

    assert_eq!(llm.call_count("expert industry analyst"), 0);
    assert_eq!(llm.call_count("expert news analyst"), 0);
}

#[tokio::test]
async fn test_search_topics_follow_analyst() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let llm = Arc::new(scripted_llm());
    let search = Arc::new(scripted_search());

    pipeline(&llm, Some(&search), &config)
        .run_to_state(CompanyProfile::new("Acme"), "job-topics")
        .await;

    let queries = search.queries();
    let topic_of = |query: &str| {
        queries
            .iter()
            .find(|(q, _)| q == query)
            .map(|(_, topic)| topic.clone())
            .unwrap_or_else(|| panic!("query {} not searched", query))
    };
    assert_eq!(topic_of("Acme products"), None);
    assert_eq!(topic_of("Acme competitors"), None);
    assert_eq!(topic_of("Acme revenue").as_deref(), Some("finance"));
    assert_eq!(topic_of("Acme announcements").as_deref(), Some("news"));
}

#[tokio::test]
async fn test_remote_results_are_written_through_to_fixtures() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let llm = Arc::new(scripted_llm());
    let search = Arc::new(scripted_search());

    pipeline(&llm, Some(&search), &config)
        .run_to_state(CompanyProfile::new("Acme"), "job-cache")
        .await;

    assert!(dir.path().join("acme").join("acme_products.json").exists());
    assert!(dir.path().join("acme").join("acme_revenue.json").exists());
    // empty result sets are not cached
    assert!(!dir.path().join("acme").join("acme_competitors.json").exists());
}

#[tokio::test]
async fn test_all_analysts_failing_fails_the_job() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let llm = Arc::new(MockLLMClient::failing());
    let search = Arc::new(scripted_search());

    let manager = JobManager::new(Arc::new(pipeline(&llm, Some(&search), &config)));
    let record = manager.run(CompanyProfile::new("Acme")).await.unwrap();

    assert_eq!(record.status, JobStatus::Failed);
    assert!(record
        .error
        .as_deref()
        .unwrap()
        .contains("No valid briefings"));
    assert!(record.report.is_none());
    assert!(manager.report(&record.id).is_err());
}

#[tokio::test]
async fn test_single_analyst_failure_is_isolated() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let report = report_text();
    let llm = Arc::new(
        MockLLMClient::new("")
            .on("expert markdown formatter", &report)
            .on("compiles research briefings", &report)
            .on("expert company analyst", COMPANY_BRIEFING)
            .on("expert financial analyst", FINANCIAL_BRIEFING)
            .on("company fundamentals", "Acme products")
            .failing_on("financial analysis of")
            .on("industry analysis of", "Acme competitors")
            .on("recent news coverage", "Acme announcements"),
    );
    let search = Arc::new(scripted_search());

    let state = pipeline(&llm, Some(&search), &config)
        .run_to_state(CompanyProfile::new("Acme"), "job-isolated")
        .await;

    assert_eq!(state.phase, Phase::Done);
    assert!(state.briefings.contains_key(&Category::Company));
    assert!(!state.briefings.contains_key(&Category::Financial));
    assert!(!state.documents.contains_key(&Category::Financial));
    assert!(state.messages.iter().any(|m| m.contains("failed")));
}

#[tokio::test]
async fn test_search_failures_leave_no_briefings() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let llm = Arc::new(scripted_llm());
    let search = Arc::new(MockSearch::failing());

    let state = pipeline(&llm, Some(&search), &config)
        .run_to_state(CompanyProfile::new("Acme"), "job-no-search")
        .await;

    assert_eq!(state.phase, Phase::Failed);
    assert!(state.error.unwrap().contains("No valid briefings"));
    assert!(state.report.is_none());
}

#[tokio::test]
async fn test_local_fixture_run_makes_no_network_calls() {
    let dir = TempDir::new().unwrap();
    let fixture = dir.path().join("acme").join("acme_overview_2025.json");
    std::fs::create_dir_all(fixture.parent().unwrap()).unwrap();
    std::fs::write(
        &fixture,
        r#"{
            "https://acme.example/about": {
                "title": "About Acme",
                "content": "Acme Corp was founded in 2009 in Springfield. The company employs 1,200 people across five offices.",
                "score": 0.88
            }
        }"#,
    )
    .unwrap();

    let config = test_config(dir.path(), RetrievalMode::Local);
    let report = report_text();
    let llm = Arc::new(
        MockLLMClient::new("")
            .on("expert markdown formatter", &report)
            .on("compiles research briefings", &report)
            .on("expert company analyst", COMPANY_BRIEFING)
            .on("company fundamentals", "Acme overview 2025")
            .on("Generate queries", "Acme something uncached"),
    );
    let search = Arc::new(MockSearch::failing());

    let state = pipeline(&llm, Some(&search), &config)
        .run_to_state(CompanyProfile::new("Acme"), "job-local")
        .await;

    assert_eq!(state.phase, Phase::Done, "error: {:?}", state.error);
    assert!(search.queries().is_empty());

    let company_docs = &state.documents[&Category::Company];
    let doc = &company_docs["https://acme.example/about"];
    assert_eq!(doc.source, DocumentSource::Local);
    assert_eq!(doc.title, "About Acme");
    assert!(state
        .report
        .unwrap()
        .contains("https://acme.example/about"));
}

#[tokio::test]
async fn test_local_grounding_seeds_site_document() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("acme_example_site.json"),
        r#"{"raw_content": "Acme builds robots. Acme Corp was founded in 2009 in Springfield."}"#,
    )
    .unwrap();

    let config = test_config(dir.path(), RetrievalMode::Local);
    let llm = Arc::new(scripted_llm());

    let state = pipeline(&llm, None, &config)
        .run_to_state(
            CompanyProfile::new("Acme").with_url("https://acme.example"),
            "job-grounded",
        )
        .await;

    assert!(state.site_scrape.as_deref().unwrap().contains("Acme builds robots"));
    assert!(state.grounding_error.is_none());
    for category in [Category::Company, Category::Financial, Category::News] {
        let doc = &state.documents[&category]["https://acme.example"];
        assert_eq!(doc.title, "Acme");
    }
    assert!(!state.documents[&Category::Industry].contains_key("https://acme.example"));
    assert_eq!(state.phase, Phase::Done);
}

#[tokio::test]
async fn test_grounding_failure_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Local);
    // malformed site fixture
    std::fs::write(dir.path().join("acme_example_site.json"), "not json").unwrap();
    let llm = Arc::new(scripted_llm());

    let state = pipeline(&llm, None, &config)
        .run_to_state(
            CompanyProfile::new("Acme").with_url("https://acme.example"),
            "job-bad-site",
        )
        .await;

    assert!(state.grounding_error.is_some());
    assert!(state.site_scrape.is_none());
    assert!(state
        .messages
        .iter()
        .any(|m| m.contains("Homepage extraction failed")));
    // the run continued past grounding and reached the editor
    assert_eq!(state.documents.len(), 4);
    assert_eq!(state.phase, Phase::Failed);
}

#[tokio::test]
async fn test_patch_stream_phase_order() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let llm = Arc::new(scripted_llm());
    let search = Arc::new(scripted_search());
    let pipeline = pipeline(&llm, Some(&search), &config);

    let patches: Vec<StatePatch> = pipeline
        .run(CompanyProfile::new("Acme"), "job-stream")
        .collect()
        .await;

    let phases: Vec<Phase> = patches.iter().filter_map(|p| p.phase).collect();
    assert_eq!(
        phases,
        vec![Phase::Grounding, Phase::Researching, Phase::Compiling, Phase::Done]
    );
    // grounding, four analysts and the editor each contribute a patch
    assert_eq!(patches.len(), 3 + 1 + 4 + 1);
    assert!(patches.last().unwrap().report.is_some());
}

#[tokio::test]
async fn test_invalid_company_fails_immediately() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let llm = Arc::new(scripted_llm());

    let state = pipeline(&llm, None, &config)
        .run_to_state(CompanyProfile::new("  "), "job-invalid")
        .await;

    assert_eq!(state.phase, Phase::Failed);
    assert!(llm.calls().is_empty());
}

#[tokio::test]
async fn test_progress_updates_are_broadcast() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let llm = Arc::new(scripted_llm());
    let search = Arc::new(scripted_search());

    let progress = BroadcastProgress::new(1024);
    let mut updates = progress.subscribe();
    let pipeline = pipeline(&llm, Some(&search), &config).with_progress(Arc::new(progress));

    pipeline
        .run_to_state(CompanyProfile::new("Acme"), "job-progress")
        .await;

    let mut statuses = Vec::new();
    while let Ok(update) = updates.try_recv() {
        assert_eq!(update.job_id, "job-progress");
        statuses.push(update.status);
    }

    assert!(statuses.contains(&ProgressStatus::QueryGenerated));
    assert!(statuses.contains(&ProgressStatus::QuerySearched));
    assert!(statuses.contains(&ProgressStatus::CategoryComplete));
    assert!(statuses.contains(&ProgressStatus::ReportChunk));
    assert_eq!(statuses.last(), Some(&ProgressStatus::Completed));
}

#[tokio::test]
async fn test_job_manager_background_job_with_store() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let llm = Arc::new(scripted_llm());
    let search = Arc::new(scripted_search());
    let store = Arc::new(InMemoryDocumentStore::new());

    let manager = JobManager::new(Arc::new(pipeline(&llm, Some(&search), &config)))
        .with_store(store.clone());
    let id = manager.start(CompanyProfile::new("Acme")).await.unwrap();

    let mut record = manager.status(&id).unwrap();
    for _ in 0..200 {
        if record.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        record = manager.status(&id).unwrap();
    }

    assert_eq!(record.status, JobStatus::Completed);
    assert!(record.updated_at >= record.created_at);
    let report = manager.report(&id).unwrap();
    assert!(report.starts_with("# Acme Research Report"));

    let stored = store.get_job(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.report.as_deref(), Some(report.as_str()));
}

#[tokio::test]
async fn test_job_manager_rejects_invalid_input() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let llm = Arc::new(scripted_llm());
    let manager = JobManager::new(Arc::new(pipeline(&llm, None, &config)));

    assert!(manager.start(CompanyProfile::new("")).await.is_err());
    assert!(manager.jobs().is_empty());
    assert!(manager.status("missing").is_err());
}

#[tokio::test]
async fn test_sweep_failure_keeps_cited_draft() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let report = report_text();
    let llm = Arc::new(
        MockLLMClient::new("")
            .failing_on("expert markdown formatter")
            .on("compiles research briefings", &report)
            .on("expert company analyst", COMPANY_BRIEFING)
            .on("expert financial analyst", FINANCIAL_BRIEFING)
            .on("company fundamentals", "Acme products\nAcme history")
            .on("financial analysis of", "Acme revenue")
            .on("Generate queries", "Acme competitors"),
    );
    let search = Arc::new(scripted_search());

    let state = pipeline(&llm, Some(&search), &config)
        .run_to_state(CompanyProfile::new("Acme"), "job-sweep-fails")
        .await;

    assert_eq!(state.phase, Phase::Done);
    let report = state.report.unwrap();
    heading_positions(&report);
    assert!(report.contains("2009<sup>[1]</sup>"), "{}", report);
    assert!(report.contains("## References"));
}

#[tokio::test]
async fn test_compile_failure_fails_the_job() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let llm = Arc::new(
        MockLLMClient::new("")
            .failing_on("compiles research briefings")
            .on("expert company analyst", COMPANY_BRIEFING)
            .on("company fundamentals", "Acme products")
            .on("Generate queries", "Acme competitors"),
    );
    let search = Arc::new(scripted_search());

    let state = pipeline(&llm, Some(&search), &config)
        .run_to_state(CompanyProfile::new("Acme"), "job-compile-fails")
        .await;

    assert_eq!(state.phase, Phase::Failed);
    assert!(state.error.unwrap().contains("Report compilation failed"));
    assert!(state.report.is_none());
}

#[tokio::test]
async fn test_query_generation_stops_at_cap() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), RetrievalMode::Remote);
    config.research.max_queries = 2;
    let llm = Arc::new(scripted_llm());
    let search = Arc::new(scripted_search());

    let state = pipeline(&llm, Some(&search), &config)
        .run_to_state(CompanyProfile::new("Acme"), "job-capped")
        .await;

    let searched: Vec<String> = search.queries().into_iter().map(|(q, _)| q).collect();
    assert!(searched.contains(&"Acme products".to_string()));
    assert!(searched.contains(&"Acme history".to_string()));
    assert!(!searched.contains(&"Acme leadership".to_string()));
    assert_eq!(state.documents[&Category::Company].len(), 2);
}

#[tokio::test]
async fn test_sweep_dropping_a_cited_sentence_drops_its_reference() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    // the draft cites products [1], history [2] and revenue [3]; the sweep
    // loses the founding sentence and with it every mark for [1]
    let swept = "# Acme Research Report\n\n\
                 ## Company Overview\n\n\
                 The company employs 1,200<sup>[2]</sup> people across five offices.\n\n\
                 ## Industry Overview\n\n\
                 ## Financial Overview\n\n\
                 Acme reported revenue of $45 million<sup>[3]</sup> in 2024<sup>[3]</sup>.\n\n\
                 ## News\n";
    let report = report_text();
    let llm = Arc::new(
        MockLLMClient::new("")
            .on("expert markdown formatter", swept)
            .on("compiles research briefings", &report)
            .on("expert company analyst", COMPANY_BRIEFING)
            .on("expert financial analyst", FINANCIAL_BRIEFING)
            .on("company fundamentals", "Acme products\nAcme history")
            .on("financial analysis of", "Acme revenue")
            .on("Generate queries", "Acme competitors"),
    );
    let search = Arc::new(scripted_search());

    let state = pipeline(&llm, Some(&search), &config)
        .run_to_state(CompanyProfile::new("Acme"), "job-sweep-drops")
        .await;

    assert_eq!(state.phase, Phase::Done);
    let report = state.report.unwrap();
    assert!(report.contains("employs 1,200<sup>[1]</sup>"), "{}", report);
    assert!(report.contains("$45 million<sup>[2]</sup> in 2024<sup>[2]</sup>"), "{}", report);
    assert!(!report.contains("[3]"), "{}", report);

    let references = &report[report.find("## References").unwrap()..];
    let entries: Vec<&str> = references
        .lines()
        .filter(|l| l.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .collect();
    assert_eq!(entries.len(), 2, "{}", references);
    assert!(entries[0].ends_with("https://news.example/acme-history"));
    assert!(entries[1].ends_with("https://finance.example/acme-revenue"));
    assert!(!references.contains("https://acme.example/products"));
}

#[tokio::test]
async fn test_query_generation_events_bracket_each_category() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let llm = Arc::new(scripted_llm());
    let search = Arc::new(scripted_search());

    let progress = BroadcastProgress::new(1024);
    let mut updates = progress.subscribe();
    pipeline(&llm, Some(&search), &config)
        .with_progress(Arc::new(progress))
        .run_to_state(CompanyProfile::new("Acme"), "job-query-events")
        .await;

    let mut events = Vec::new();
    while let Ok(update) = updates.try_recv() {
        let category = update
            .result
            .as_ref()
            .and_then(|r| r["category"].as_str())
            .map(str::to_string);
        events.push((update.status, category, update.result));
    }

    let position = |status: ProgressStatus, category: &str| {
        events
            .iter()
            .position(|(s, c, _)| *s == status && c.as_deref() == Some(category))
            .unwrap_or_else(|| panic!("no {:?} for {}", status, category))
    };

    let started = position(ProgressStatus::QueryGenerationStarted, "company_analyst");
    let first = position(ProgressStatus::QueryGenerated, "company_analyst");
    let all = position(ProgressStatus::QueriesGenerated, "company_analyst");
    let searched = position(ProgressStatus::QuerySearched, "company_analyst");
    assert!(started < first && first < all && all < searched);

    let (_, _, result) = &events[all];
    let result = result.as_ref().unwrap();
    assert_eq!(result["total_queries"], 3);
    assert_eq!(result["queries"][0], "Acme products");
}

#[tokio::test]
async fn test_one_failing_query_keeps_sibling_documents() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), RetrievalMode::Remote);
    let llm = Arc::new(scripted_llm());
    let search = Arc::new(scripted_search().failing_on("history"));

    let state = pipeline(&llm, Some(&search), &config)
        .run_to_state(CompanyProfile::new("Acme"), "job-query-isolation")
        .await;

    assert_eq!(state.phase, Phase::Done);
    let company = &state.documents[&Category::Company];
    assert!(company.contains_key("https://acme.example/products"));
    assert!(company.contains_key("https://people.example/acme-leadership"));
    assert!(!company.contains_key("https://news.example/acme-history"));
    assert!(state.briefings.contains_key(&Category::Company));
}

#[tokio::test]
async fn test_stalled_analyst_times_out_without_blocking_the_report() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), RetrievalMode::Remote);
    config.research.request_timeout_secs = 1;
    let report = report_text();
    let llm = Arc::new(
        MockLLMClient::new("")
            .hanging_on("recent news coverage")
            .on("expert markdown formatter", &report)
            .on("compiles research briefings", &report)
            .on("expert company analyst", COMPANY_BRIEFING)
            .on("expert financial analyst", FINANCIAL_BRIEFING)
            .on("company fundamentals", "Acme products")
            .on("financial analysis of", "Acme revenue")
            .on("industry analysis of", "Acme competitors"),
    );
    let search = Arc::new(scripted_search());

    let progress = BroadcastProgress::new(1024);
    let mut updates = progress.subscribe();
    let state = tokio::time::timeout(
        Duration::from_secs(30),
        pipeline(&llm, Some(&search), &config)
            .with_progress(Arc::new(progress))
            .run_to_state(CompanyProfile::new("Acme"), "job-stalled"),
    )
    .await
    .expect("pipeline must not wait on the stalled analyst");

    assert_eq!(state.phase, Phase::Done);
    assert!(state.report.is_some());
    assert!(!state.documents.contains_key(&Category::News));
    assert!(state
        .messages
        .iter()
        .any(|m| m.contains("news_analyst failed") && m.contains("timed out after 1s")));

    let mut news_failure = None;
    while let Ok(update) = updates.try_recv() {
        if update.status == ProgressStatus::CategoryFailed {
            news_failure = update.error;
        }
    }
    assert!(news_failure.unwrap().contains("query generation timed out"));
}
