//! Audit reports
//!
//! This module handles:
//! - Counters accumulated while a project is audited
//! - Typed change entries ("was X, now Y") and issues
//! - Logging and printing of finished reports
//!
//! Each page is reconciled into its own [`Report`], which the project
//! runner merges into the [`ProjectReport`] once the page is done.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use uuid::Uuid;

/// Example and page counts for one audit run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCounters {
    /// Live pages in the incoming snapshot
    pub current_pages: usize,
    pub new_pages: usize,
    pub updated_pages: usize,
    pub removed_pages: usize,
    /// Stored pages before this run
    pub existing_pages: usize,

    pub incoming_examples: usize,
    pub incoming_literal_includes: usize,
    pub incoming_io_code_blocks: usize,
    /// Active example occurrences stored before this run
    pub existing_examples: usize,
    pub existing_literal_includes: usize,
    pub existing_io_code_blocks: usize,

    pub new_examples: usize,
    pub updated_examples: usize,
    pub unchanged_examples: usize,
    pub removed_examples: usize,
}

impl AddAssign for ProjectCounters {
    fn add_assign(&mut self, other: Self) {
        self.current_pages += other.current_pages;
        self.new_pages += other.new_pages;
        self.updated_pages += other.updated_pages;
        self.removed_pages += other.removed_pages;
        self.existing_pages += other.existing_pages;
        self.incoming_examples += other.incoming_examples;
        self.incoming_literal_includes += other.incoming_literal_includes;
        self.incoming_io_code_blocks += other.incoming_io_code_blocks;
        self.existing_examples += other.existing_examples;
        self.existing_literal_includes += other.existing_literal_includes;
        self.existing_io_code_blocks += other.existing_io_code_blocks;
        self.new_examples += other.new_examples;
        self.updated_examples += other.updated_examples;
        self.unchanged_examples += other.unchanged_examples;
        self.removed_examples += other.removed_examples;
    }
}

impl ProjectCounters {
    /// Incoming examples that landed in a bucket
    pub fn classified_examples(&self) -> usize {
        self.new_examples + self.updated_examples + self.unchanged_examples
    }
}

/// Something the run changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    PageCreated { page_id: String },
    PageUpdated { page_id: String },
    PageRemoved { page_id: String },
    KeywordsUpdated { page_id: String },
    CodeExampleCreated { page_id: String, count: usize },
    CodeExampleUpdated { page_id: String, count: usize },
    CodeExampleRemoved { page_id: String, count: usize },
    CodeExampleCountChange { page_id: String, was: usize, now: usize },
    LiteralIncludeCountChange { page_id: String, was: usize, now: usize },
    IoCodeBlockCountChange { page_id: String, was: usize, now: usize },
    ProjectSummaryCodeCountChange { project: String, was: usize, now: usize },
    ProjectSummaryPageCountChange { project: String, was: usize, now: usize },
}

impl Change {
    /// Short label of the change kind
    pub fn kind(&self) -> &'static str {
        match self {
            Change::PageCreated { .. } => "Page created",
            Change::PageUpdated { .. } => "Page updated",
            Change::PageRemoved { .. } => "Page removed",
            Change::KeywordsUpdated { .. } => "Keywords updated",
            Change::CodeExampleCreated { .. } => "Code example created",
            Change::CodeExampleUpdated { .. } => "Code example updated",
            Change::CodeExampleRemoved { .. } => "Code example removed",
            Change::CodeExampleCountChange { .. } => "Code example count change",
            Change::LiteralIncludeCountChange { .. } => "Literalinclude count change",
            Change::IoCodeBlockCountChange { .. } => "Io-code-block count change",
            Change::ProjectSummaryCodeCountChange { .. } => "Project summary code count change",
            Change::ProjectSummaryPageCountChange { .. } => "Project summary page count change",
        }
    }
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::PageCreated { page_id }
            | Change::PageUpdated { page_id }
            | Change::PageRemoved { page_id }
            | Change::KeywordsUpdated { page_id } => write!(f, "Page ID: {}", page_id),
            Change::CodeExampleCreated { page_id, count } => {
                write!(f, "Page ID: {}, {} new code examples added", page_id, count)
            }
            Change::CodeExampleUpdated { page_id, count } => {
                write!(f, "Page ID: {}, {} code examples updated", page_id, count)
            }
            Change::CodeExampleRemoved { page_id, count } => {
                write!(f, "Page ID: {}, {} code examples removed", page_id, count)
            }
            Change::CodeExampleCountChange { page_id, was, now } => write!(
                f,
                "Page ID: {}, code example count was {}, now {}",
                page_id, was, now
            ),
            Change::LiteralIncludeCountChange { page_id, was, now } => write!(
                f,
                "Page ID: {}, literalinclude count was {}, now {}",
                page_id, was, now
            ),
            Change::IoCodeBlockCountChange { page_id, was, now } => write!(
                f,
                "Page ID: {}, io-code-block count was {}, now {}",
                page_id, was, now
            ),
            Change::ProjectSummaryCodeCountChange { project, was, now } => write!(
                f,
                "Project {}: code example count from summary was {}, now {}",
                project, was, now
            ),
            Change::ProjectSummaryPageCountChange { project, was, now } => write!(
                f,
                "Project {}: page count from summary was {}, now {}",
                project, was, now
            ),
        }
    }
}

/// Something that looks wrong but did not stop the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Issue {
    /// Example counts that should agree but don't
    CodeExampleCountIssue {
        scope: String,
        expected: usize,
        actual: usize,
    },
    /// Page counts that should agree but don't
    PageCountIssue {
        project: String,
        expected: usize,
        actual: usize,
    },
    /// Categorization failed and the fallback category was used
    CategorizationFailed { page_id: String, reason: String },
    /// The page was skipped and its stored record left untouched
    PageAborted { page_id: String, reason: String },
    /// A snapshot whose page id could not be converted
    InvalidPageId { raw: String },
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Issue::CodeExampleCountIssue {
                scope,
                expected,
                actual,
            } => write!(
                f,
                "{}: expected {} code examples, counted {}",
                scope, expected, actual
            ),
            Issue::PageCountIssue {
                project,
                expected,
                actual,
            } => write!(
                f,
                "Project {}: expected {} pages, counted {}",
                project, expected, actual
            ),
            Issue::CategorizationFailed { page_id, reason } => write!(
                f,
                "Page ID: {}, categorization failed ({}); stored as Uncategorized",
                page_id, reason
            ),
            Issue::PageAborted { page_id, reason } => {
                write!(f, "Page ID: {}, skipped: {}", page_id, reason)
            }
            Issue::InvalidPageId { raw } => write!(f, "Invalid page id: {}", raw),
        }
    }
}

/// Counters, changes, and issues for one page or a whole project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub counters: ProjectCounters,
    pub changes: Vec<Change>,
    pub issues: Vec<Issue>,
}

impl Report {
    pub fn change(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Record an issue when two counts disagree
    pub fn check_count(&mut self, scope: &str, expected: usize, actual: usize) {
        if expected != actual {
            self.issue(Issue::CodeExampleCountIssue {
                scope: scope.to_string(),
                expected,
                actual,
            });
        }
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: Report) {
        self.counters += other.counters;
        self.changes.extend(other.changes);
        self.issues.extend(other.issues);
    }
}

/// The report of one project audit run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectReport {
    pub run_id: Uuid,
    pub project: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub report: Report,
}

impl ProjectReport {
    pub fn new(project: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            project: project.into(),
            version: version.into(),
            started_at: Utc::now(),
            completed_at: None,
            report: Report::default(),
        }
    }

    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
    }
}

/// Emit a finished report through `tracing`
pub fn log_report(report: &ProjectReport) {
    let c = &report.report.counters;
    tracing::info!(
        run_id = %report.run_id,
        project = %report.project,
        version = %report.version,
        new_pages = c.new_pages,
        updated_pages = c.updated_pages,
        removed_pages = c.removed_pages,
        new_examples = c.new_examples,
        updated_examples = c.updated_examples,
        unchanged_examples = c.unchanged_examples,
        removed_examples = c.removed_examples,
        "Audit finished"
    );

    for change in &report.report.changes {
        tracing::info!(kind = change.kind(), "{}", change);
    }
    for issue in &report.report.issues {
        tracing::warn!("{}", issue);
    }
}

/// Print a report as JSON
pub fn print_report_json(report: &ProjectReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{}", json);
    Ok(())
}

/// Print a report as text
pub fn print_report_text(report: &ProjectReport) {
    let c = &report.report.counters;

    println!("Audit of {} ({})", report.project, report.version);
    println!("  Run: {}", report.run_id);
    println!();
    println!("Pages:");
    println!("  Current: {}", c.current_pages);
    println!("  New: {}  Updated: {}  Removed: {}", c.new_pages, c.updated_pages, c.removed_pages);
    println!();
    println!("Code examples:");
    println!("  Incoming: {}  (previously {})", c.incoming_examples, c.existing_examples);
    println!(
        "  New: {}  Updated: {}  Unchanged: {}  Removed: {}",
        c.new_examples, c.updated_examples, c.unchanged_examples, c.removed_examples
    );
    println!(
        "  Literal includes: {}  Io-code-blocks: {}",
        c.incoming_literal_includes, c.incoming_io_code_blocks
    );

    if !report.report.changes.is_empty() {
        println!("\nChanges ({}):", report.report.changes.len());
        for change in &report.report.changes {
            println!("  [{}] {}", change.kind(), change);
        }
    }

    if report.report.issues.is_empty() {
        println!("\n✓ No issues");
    } else {
        println!("\n⚠ {} issue(s):", report.report.issues.len());
        for issue in &report.report.issues {
            println!("  - {}", issue);
        }
    }
}
