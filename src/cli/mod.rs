//! CLI interface using clap
//!
//! Provides the command-line interface for docaudit

mod commands;

pub use commands::*;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docaudit - keeps a record of the code examples on documentation pages
#[derive(Parser, Debug)]
#[command(name = "docaudit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the audit workspace (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub path: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a docaudit workspace
    Init(InitArgs),

    /// Audit a project's page snapshots against the stored records
    Audit(AuditArgs),

    /// Show stored totals and the latest run
    Status(StatusArgs),

    /// Measure how much one example changed into another
    Compare(CompareArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Force re-initialization
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for audit command
#[derive(Parser, Debug)]
#[command(disable_version_flag = true)]
pub struct AuditArgs {
    /// Directory of page snapshot JSON files
    pub pages_dir: PathBuf,

    /// Project name
    #[arg(long)]
    pub project: String,

    /// Production URL prefix for the project's pages
    #[arg(long)]
    pub site_url: String,

    /// Version (branch) being audited
    #[arg(long, default_value = "master")]
    pub version: String,

    /// The project documents a single driver language
    #[arg(long)]
    pub primary_language: bool,

    /// Categorize with rules only, even if a model is configured
    #[arg(long)]
    pub no_llm: bool,

    /// Fuzzy-match threshold for this run
    #[arg(short, long)]
    pub threshold: Option<f64>,
}

/// Arguments for status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Limit to one project
    #[arg(long)]
    pub project: Option<String>,
}

/// Arguments for compare command
#[derive(Parser, Debug)]
pub struct CompareArgs {
    /// File holding the stored example
    pub original: PathBuf,

    /// File holding the incoming example
    pub candidate: PathBuf,

    /// Fuzzy-match threshold
    #[arg(short, long)]
    pub threshold: Option<f64>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Show current configuration
    #[arg(long)]
    pub show: bool,

    /// Reset to defaults
    #[arg(long)]
    pub reset: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
