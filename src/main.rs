use anyhow::{bail, Context};
use company_research::cli::init::{self, InitConfig, InitResult};
use company_research::cli::output::Output;
use company_research::cli::{company_profile, Cli, Commands};
use company_research::jobs::{InMemoryDocumentStore, JobManager, JobStatus};
use company_research::research::{BroadcastProgress, ResearchPipeline};
use company_research::utils::logging::init_tracing;
use company_research::utils::toml_config::{
    ConfigError, ProviderConfig, ResearchConfig, RetrievalMode, SearchConfig,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Commands::Init { path, force } => {
            match init::run(InitConfig { path, force }, &output) {
                InitResult::Success | InitResult::AlreadyExists => Ok(()),
                InitResult::Error(e) => bail!("init failed: {}", e),
            }
        }
        Commands::Config { validate } => {
            let config = read_config(&cli.config, &output)?;
            init_tracing(&config.logging, cli.verbose);
            show_config(&config, &output);

            if validate {
                match config.validate() {
                    Ok(()) => output.success("Configuration is valid"),
                    Err(e) => {
                        output.error(&e.to_string());
                        bail!("invalid configuration");
                    }
                }
            }
            Ok(())
        }
        Commands::Run {
            company,
            url,
            industry,
            hq,
            local,
            output: report_path,
        } => {
            let mut config = read_config(&cli.config, &output)?;
            if local {
                config.research.mode = RetrievalMode::Local;
            }
            config
                .validate()
                .with_context(|| format!("invalid configuration in {}", cli.config.display()))?;
            init_tracing(&config.logging, cli.verbose);

            let profile = company_profile(
                &company,
                url.as_deref(),
                industry.as_deref(),
                hq.as_deref(),
            );
            run_job(profile, &config, report_path.as_deref(), cli.verbose, &output).await
        }
    }
}

/// Parse the config file, falling back to defaults when it does not exist.
fn read_config(path: &Path, output: &Output) -> anyhow::Result<ResearchConfig> {
    match ResearchConfig::load_without_env(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            output.warning(&format!(
                "{} not found, using default configuration",
                path.display()
            ));
            Ok(ResearchConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("failed to load {}", path.display())),
    }
}

fn show_config(config: &ResearchConfig, output: &Output) {
    output.header("Configuration");

    match &config.provider {
        ProviderConfig::OpenAI {
            api_key_env,
            api_base,
        } => {
            output.kv("provider", &format!("openai ({})", api_base));
            output.kv("api key env", api_key_env);
        }
        ProviderConfig::Ollama { base_url } => {
            output.kv("provider", &format!("ollama ({})", base_url));
        }
    }
    output.kv("query model", &config.models.queries);
    output.kv("briefing model", &config.models.briefing);
    output.kv("compile model", &config.models.compile);
    output.kv("sweep model", &config.models.sweep);

    let search = match &config.search {
        SearchConfig::Tavily { search_depth, .. } => format!("tavily ({})", search_depth),
        SearchConfig::DuckDuckGo { .. } => "duckduckgo".to_string(),
    };
    output.kv("search", &search);
    output.kv("max results", &config.search.max_results().to_string());
    output.kv("mode", &format!("{:?}", config.research.mode).to_lowercase());
    output.kv("fixture dir", &config.research.fixture_dir.display().to_string());
    output.kv("citation style", &format!("{:?}", config.citations.style).to_lowercase());
}

async fn run_job(
    profile: company_research::types::CompanyProfile,
    config: &ResearchConfig,
    report_path: Option<&Path>,
    verbose: bool,
    output: &Output,
) -> anyhow::Result<()> {
    output.banner();
    output.step(1, 2, &format!("Researching {}", profile.name));

    let progress = BroadcastProgress::new(256);
    let mut updates = progress.subscribe();
    let colored = output.colored;
    let printer = tokio::spawn(async move {
        let output = if colored {
            Output::new()
        } else {
            Output::no_color()
        };
        loop {
            match updates.recv().await {
                Ok(update) => output.progress(&update, verbose),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let pipeline = ResearchPipeline::from_config(config)
        .context("failed to set up the research pipeline")?
        .with_progress(Arc::new(progress));
    let manager = JobManager::new(Arc::new(pipeline))
        .with_store(Arc::new(InMemoryDocumentStore::new()));

    let record = manager.run(profile).await?;

    // Dropping the pipeline closes the progress channel
    drop(manager);
    printer.await.ok();

    if record.status != JobStatus::Completed {
        let error = record.error.unwrap_or_else(|| "unknown error".to_string());
        output.error(&error);
        bail!("research job {} failed", record.id);
    }

    output.step(2, 2, "Writing report");
    let report = record.report.unwrap_or_default();
    match report_path {
        Some(path) => {
            std::fs::write(path, &report)
                .with_context(|| format!("failed to write {}", path.display()))?;
            output.created("report", &path.display().to_string());
        }
        None => println!("{}", report),
    }

    output.complete(&format!("Job {} completed", record.id));
    Ok(())
}
