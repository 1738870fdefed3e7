//! Command implementations

use super::{AuditArgs, CompareArgs, ConfigArgs, OutputFormat};
use crate::audit::{ProjectAuditor, ProjectDetails};
use crate::categorize::{Categorizer, LlmCategorizer, LlmClient, RuleCategorizer};
use crate::config::{AuditConfig, WORKSPACE_DIR};
use crate::extract::load_snapshots;
use crate::reconcile::{percent_changed, MatchPolicy};
use crate::report::{print_report_json, print_report_text, ProjectReport};
use crate::storage::Database;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

/// Initialize a docaudit workspace
pub fn init(path: &Path, force: bool) -> Result<()> {
    let workspace = path.join(WORKSPACE_DIR);
    if workspace.exists() && !force {
        anyhow::bail!("docaudit already initialized. Use --force to re-initialize.");
    }

    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("Failed to create {:?}", workspace))?;

    let config = AuditConfig::default();
    let db_path = config.database_path(path);
    let _db = Database::open(&db_path)?;

    config.save(path)?;

    println!("✓ Initialized docaudit in {:?}", path);
    println!("  Database: {:?}", db_path);
    println!("  Config: {:?}", AuditConfig::config_path(path));

    Ok(())
}

/// Open the workspace database, refusing to create one implicitly
fn open_database(path: &Path, config: &AuditConfig) -> Result<Database> {
    if !path.join(WORKSPACE_DIR).exists() {
        anyhow::bail!("docaudit not initialized. Run 'docaudit init' first.");
    }
    Database::open(config.database_path(path))
}

/// Pick the categorizer for a run
///
/// Falls back to rules alone when the model endpoint can't be reached.
async fn categorizer(config: &AuditConfig, no_llm: bool) -> Arc<dyn Categorizer> {
    if no_llm || !config.llm.enabled {
        return Arc::new(RuleCategorizer);
    }

    let client = LlmClient::new(config.llm.client_config());
    if !client.is_available().await {
        tracing::warn!(
            "LLM endpoint {} is not reachable, categorizing with rules only",
            config.llm.endpoint
        );
        return Arc::new(RuleCategorizer);
    }

    tracing::info!("Categorizing with {} at {}", config.llm.model, config.llm.endpoint);
    Arc::new(LlmCategorizer::new(client, config.llm.timeout()))
}

/// Audit a project's page snapshots
pub fn audit(path: &Path, args: &AuditArgs) -> Result<ProjectReport> {
    let config = AuditConfig::load_or_default(path)?;
    let policy = match args.threshold {
        Some(threshold) => {
            MatchPolicy::new(threshold)?.with_tie_break(config.reconcile.tie_break)
        }
        None => config.match_policy(&args.project)?,
    };

    let db = open_database(path, &config)?;
    let snapshots = load_snapshots(&args.pages_dir)?;

    let details = ProjectDetails {
        name: args.project.clone(),
        version: args.version.clone(),
        site_url: args.site_url.clone(),
        primary_language: args.primary_language,
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async {
        let categorizer = categorizer(&config, args.no_llm).await;
        ProjectAuditor::new(categorizer, policy)
            .on_categorize_error(config.reconcile.on_categorize_error)
            .audit(&db, &details, &snapshots)
            .await
    })
}

/// Print an audit report in the requested format
pub fn print_report(report: &ProjectReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_report_json(report)?,
        OutputFormat::Text => print_report_text(report),
    }
    Ok(())
}

/// Show stored totals and the latest run
pub fn status(path: &Path, project: Option<&str>, format: OutputFormat) -> Result<()> {
    let config = AuditConfig::load_or_default(path)?;
    let db = open_database(path, &config)?;

    let stats = db.get_stats(project)?;
    let latest = db.latest_run(project)?;
    let summary = match project {
        Some(name) => db.get_project_summary(name)?,
        None => None,
    };

    if format == OutputFormat::Json {
        let json = serde_json::json!({
            "stats": stats,
            "summary": summary,
            "latest_run": latest,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("docaudit Status");
    println!("===============\n");

    if let Some(name) = project {
        println!("Project: {}", name);
    }
    println!("Pages: {}", stats.pages);
    println!("Removed pages: {}", stats.removed_pages);
    println!("Code examples: {}", stats.active_examples);
    println!("Removed code examples: {}", stats.removed_examples);
    println!("Audit runs: {}", stats.runs);

    if let Some((version, totals)) = summary.as_ref().and_then(|s| s.latest_version()) {
        println!(
            "\nVersion {}: {} pages, {} code examples",
            version, totals.total_page_count, totals.total_code_count
        );
    }

    match latest {
        None => println!("\nNo audits recorded yet."),
        Some(run) => {
            println!("\nLatest run: {} ({} {})", run.run_id, run.project, run.version);
            println!("  Started: {}", run.started_at.format("%Y-%m-%d %H:%M:%S"));
            if run.report.issues.is_empty() {
                println!("  ✓ No issues");
            } else {
                println!("  ⚠ {} issue(s)", run.report.issues.len());
            }
        }
    }

    Ok(())
}

/// Report how much one example changed into another
pub fn compare(path: &Path, args: &CompareArgs, format: OutputFormat) -> Result<()> {
    let threshold = match args.threshold {
        Some(threshold) => threshold,
        None => AuditConfig::load_or_default(path)?.reconcile.fuzzy_threshold,
    };
    let policy = MatchPolicy::new(threshold)?;

    let original = std::fs::read_to_string(&args.original)
        .with_context(|| format!("Failed to read {:?}", args.original))?;
    let candidate = std::fs::read_to_string(&args.candidate)
        .with_context(|| format!("Failed to read {:?}", args.candidate))?;

    let percent = percent_changed(original.trim(), candidate.trim());
    let updated = percent < policy.threshold;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "percent_changed": percent,
                "threshold": policy.threshold,
                "is_update": updated,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Changed: {:.1}% (threshold {})", percent, policy.threshold);
            if updated {
                println!("✓ Counts as an update of the original");
            } else {
                println!("⚠ Counts as a new example");
            }
        }
    }

    Ok(())
}

/// Show or reset the workspace configuration
pub fn handle_config(path: &Path, args: &ConfigArgs) -> Result<()> {
    if args.reset {
        AuditConfig::default().save(path)?;
        println!("✓ Configuration reset to defaults");
        return Ok(());
    }

    let config = AuditConfig::load_or_default(path)?;

    println!("docaudit Configuration");
    println!("======================\n");

    println!("Database: {:?}", config.database_path(path));
    println!("Fuzzy threshold: {}", config.reconcile.fuzzy_threshold);
    println!("Tie break: {:?}", config.reconcile.tie_break);
    println!("On categorize error: {:?}", config.reconcile.on_categorize_error);

    if !config.reconcile.project_thresholds.is_empty() {
        println!("\nProject thresholds:");
        for (project, threshold) in &config.reconcile.project_thresholds {
            println!("  - {}: {}", project, threshold);
        }
    }

    println!("\nLLM enabled: {}", config.llm.enabled);
    println!("LLM endpoint: {}", config.llm.endpoint);
    println!("LLM model: {}", config.llm.model);
    println!("LLM timeout: {}s", config.llm.timeout_secs);

    Ok(())
}
