//! Project audit runs
//!
//! This module handles:
//! - Walking a project's page snapshots through reconciliation
//! - Removing pages that left the project
//! - Updating the project summary and writing everything in one batch
//! - Persisting and logging the run's report
//!
//! Page-level failures never stop a run: the page is skipped, its stored
//! record stays as it was, and the failure shows up as an issue.

mod summary;

pub use summary::{ProjectSummary, VersionSummary};

use crate::categorize::Categorizer;
use crate::extract::{extract_page, PageSnapshot};
use crate::reconcile::{CategorizeFailure, MatchPolicy, PageOutcome, PageReconciler};
use crate::record::PageRecord;
use crate::report::{log_report, Issue, ProjectReport};
use crate::storage::Database;
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// What the runner needs to know about a project
#[derive(Debug, Clone)]
pub struct ProjectDetails {
    pub name: String,
    /// Version (branch) being audited
    pub version: String,
    /// Production URL prefix for the project's pages
    pub site_url: String,
    /// Whether the project documents a single driver language
    pub primary_language: bool,
}

/// Audits whole projects against the page store
pub struct ProjectAuditor {
    categorizer: Arc<dyn Categorizer>,
    policy: MatchPolicy,
    on_categorize_error: CategorizeFailure,
}

impl ProjectAuditor {
    pub fn new(categorizer: Arc<dyn Categorizer>, policy: MatchPolicy) -> Self {
        Self {
            categorizer,
            policy,
            on_categorize_error: CategorizeFailure::default(),
        }
    }

    pub fn on_categorize_error(mut self, policy: CategorizeFailure) -> Self {
        self.on_categorize_error = policy;
        self
    }

    /// Run one audit of a project
    ///
    /// Storage errors abort the run before anything is written.
    pub async fn audit(
        &self,
        db: &Database,
        details: &ProjectDetails,
        snapshots: &[PageSnapshot],
    ) -> Result<ProjectReport> {
        let project = details.name.as_str();
        let mut run = ProjectReport::new(project, &details.version);
        tracing::info!("Auditing {} ({}), {} snapshots", project, details.version, snapshots.len());

        let reconciler = PageReconciler::new(self.policy, self.categorizer.as_ref())
            .on_categorize_error(self.on_categorize_error)
            .primary_language_project(details.primary_language);

        let existing_ids = db.page_ids(project)?;
        run.report.counters.existing_pages = existing_ids.len();

        let mut seen: HashSet<String> = HashSet::new();
        let mut new_pages: Vec<PageRecord> = Vec::new();
        let mut updated_pages: Vec<PageRecord> = Vec::new();

        for snapshot in snapshots {
            let incoming = match extract_page(snapshot, &details.site_url) {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!("Skipping snapshot: {}", e);
                    run.report.issue(Issue::InvalidPageId {
                        raw: snapshot.page_id.clone(),
                    });
                    continue;
                }
            };

            if !seen.insert(incoming.id.clone()) {
                tracing::warn!("Duplicate snapshot for page {}, keeping the first", incoming.id);
                continue;
            }

            let existing = db.get_page(project, &incoming.id)?;

            if incoming.deleted {
                if let Some(existing) = existing.filter(|p| !p.is_removed) {
                    let outcome = reconciler.remove_page(&existing);
                    run.report.merge(outcome.report);
                    updated_pages.extend(outcome.page);
                }
                continue;
            }

            let result = match &existing {
                Some(page) => reconciler.update_existing_page(page, &incoming).await,
                None => reconciler.create_page(&incoming, project).await,
            };

            match result {
                Ok(PageOutcome { page, report }) => {
                    run.report.merge(report);
                    run.report.counters.current_pages += 1;
                    match (page, existing.is_some()) {
                        (Some(page), false) => new_pages.push(page),
                        (Some(page), true) => updated_pages.push(page),
                        (None, _) => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("Page {} skipped: {:#}", incoming.id, e);
                    // The stored page is still live, so it still counts
                    if existing.as_ref().is_some_and(|p| !p.is_removed) {
                        run.report.counters.current_pages += 1;
                    }
                    run.report.issue(Issue::PageAborted {
                        page_id: incoming.id.clone(),
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        for id in existing_ids.iter().filter(|id| !seen.contains(*id)) {
            if let Some(existing) = db.get_page(project, id)? {
                let outcome = reconciler.remove_page(&existing);
                run.report.merge(outcome.report);
                updated_pages.extend(outcome.page);
            }
        }

        let mut summary = db
            .get_project_summary(project)?
            .unwrap_or_else(|| ProjectSummary::new(project));
        summary.apply(&details.version, &mut run.report);

        db.batch_replace(project, &new_pages, &updated_pages, &summary)?;

        run.finish();
        db.record_run(&run)?;
        log_report(&run);

        Ok(run)
    }
}
