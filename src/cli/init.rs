//! Init command implementation
//!
//! Writes a default `research.toml`, an `.env.example` naming the credentials
//! it references, and the local fixture directory.

use super::output::Output;
use crate::utils::toml_config::{ProviderConfig, ResearchConfig, SearchConfig};
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// research.toml already exists
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing research project");

    let base_path = &config.path;
    let config_path = base_path.join("research.toml");
    if config_path.exists() && !config.force {
        output.warning("research.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    let defaults = ResearchConfig::default();

    let toml_content = match generate_research_toml(&defaults) {
        Ok(content) => content,
        Err(e) => {
            output.error(&format!("Failed to render research.toml: {}", e));
            return InitResult::Error(e);
        }
    };
    if let Err(e) = fs::create_dir_all(base_path) {
        output.error(&format!("Failed to create {}: {}", base_path.display(), e));
        return InitResult::Error(e.to_string());
    }
    if let Err(e) = write_file(&config_path, &toml_content, true) {
        output.error(&format!("Failed to create research.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "research.toml");

    let env_path = base_path.join(".env.example");
    match write_file(&env_path, &generate_env_example(&defaults), config.force) {
        Ok(true) => output.created("env", ".env.example"),
        Ok(false) => output.skipped(".env.example", "already exists"),
        Err(e) => output.warning(&format!("Failed to create .env.example: {}", e)),
    }

    let fixture_dir = base_path.join(&defaults.research.fixture_dir);
    if fixture_dir.exists() {
        output.skipped(&defaults.research.fixture_dir.display().to_string(), "already exists");
    } else if let Err(e) = fs::create_dir_all(&fixture_dir) {
        output.warning(&format!("Failed to create fixture directory: {}", e));
    } else {
        output.created("directory", &defaults.research.fixture_dir.display().to_string());
    }

    output.complete("Project initialized");
    output.info("Set the credentials, then run a job:");
    output.command("cp .env.example .env");
    output.command("company-research run \"Acme Corp\" --url https://acme.example");
    output.hint("Runs with --local read cached results from the fixture directory only");

    InitResult::Success
}

/// Returns `Ok(false)` when the file exists and `force` is unset.
fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    fs::write(path, content)?;
    Ok(true)
}

fn generate_research_toml(config: &ResearchConfig) -> Result<String, String> {
    let body = config.to_toml_string().map_err(|e| e.to_string())?;
    Ok(format!(
        "# company-research configuration\n\
         #\n\
         # Secrets are read from the environment variables named below.\n\
         # Set research.mode = \"local\" to replay results from research.fixture_dir.\n\n{}",
        body
    ))
}

fn generate_env_example(config: &ResearchConfig) -> String {
    let mut lines = vec!["# Credentials referenced by research.toml".to_string()];

    if let ProviderConfig::OpenAI { api_key_env, .. } = &config.provider {
        lines.push(format!("{}=", api_key_env));
    }
    match &config.search {
        SearchConfig::Tavily { api_key_env, .. } => lines.push(format!("{}=", api_key_env)),
        SearchConfig::DuckDuckGo { .. } => {
            lines.push("# DuckDuckGo search needs no key".to_string())
        }
    }
    lines.push("RUST_LOG=company_research=info".to_string());

    lines.join("\n") + "\n"
}
