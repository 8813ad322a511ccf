//! CLI module for company-research
//!
//! Provides command-line interface parsing for the `company-research` binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use crate::types::CompanyProfile;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// company-research - multi-analyst company research reports
///
/// Researches a company across four categories in parallel and compiles a
/// cited markdown report.
#[derive(Parser, Debug)]
#[command(
    name = "company-research",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Multi-analyst company research with source-linked citations",
    long_about = "Researches a company across four categories (company, industry, financials,\n\
                  news) in parallel, then compiles one markdown report whose figures link\n\
                  back to the sources they came from.",
    after_help = "EXAMPLES:\n    \
                  company-research init                                  # Write research.toml\n    \
                  company-research run Acme --url https://acme.example   # Research a company\n    \
                  company-research run Acme --local                      # Use local fixtures only\n    \
                  company-research config --validate                     # Check configuration"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "research.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a company and print the report
    Run {
        /// Company name
        company: String,

        /// Company homepage, used for grounding
        #[arg(long)]
        url: Option<String>,

        /// Industry hint for the analysts
        #[arg(long)]
        industry: Option<String>,

        /// Headquarters location hint
        #[arg(long)]
        hq: Option<String>,

        /// Read search results from local fixtures instead of the network
        #[arg(long)]
        local: bool,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a default research.toml
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file and required credentials
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Build the research input from `run` arguments.
pub fn company_profile(
    company: &str,
    url: Option<&str>,
    industry: Option<&str>,
    hq: Option<&str>,
) -> CompanyProfile {
    let mut profile = CompanyProfile::new(company.trim());
    if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
        profile = profile.with_url(url.trim());
    }
    if let Some(industry) = industry.filter(|i| !i.trim().is_empty()) {
        profile = profile.with_industry(industry.trim());
    }
    if let Some(hq) = hq.filter(|h| !h.trim().is_empty()) {
        profile = profile.with_hq(hq.trim());
    }
    profile
}
