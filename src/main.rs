//! docaudit - keeps an audited history of the code examples on
//! documentation pages
//!
//! Each run compares a project's current page snapshots with the stored
//! records and reports what was added, edited, and removed.

use anyhow::Result;
use docaudit::cli::{audit, compare, handle_config, init, print_report, status, Cli, Commands};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Setup logging; RUST_LOG takes precedence over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let workspace = Path::new(&cli.path);

    match cli.command {
        Commands::Init(args) => {
            init(workspace, args.force)?;
        }

        Commands::Audit(args) => {
            let report = audit(workspace, &args)?;
            print_report(&report, cli.format)?;
        }

        Commands::Status(args) => {
            status(workspace, args.project.as_deref(), cli.format)?;
        }

        Commands::Compare(args) => {
            compare(workspace, &args, cli.format)?;
        }

        Commands::Config(args) => {
            handle_config(workspace, &args)?;
        }
    }

    Ok(())
}
