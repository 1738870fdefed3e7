//! Per-project totals tracked across runs

use crate::report::{Change, Issue, Report};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Totals for one version of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub total_page_count: usize,
    pub total_code_count: usize,
    pub last_updated: DateTime<Utc>,
}

/// Page and code example totals for every audited version of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project: String,
    #[serde(default)]
    pub versions: BTreeMap<String, VersionSummary>,
}

impl ProjectSummary {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            versions: BTreeMap::new(),
        }
    }

    /// The most recently updated version
    pub fn latest_version(&self) -> Option<(&str, &VersionSummary)> {
        self.versions
            .iter()
            .max_by_key(|(_, summary)| summary.last_updated)
            .map(|(version, summary)| (version.as_str(), summary))
    }

    /// Fold a finished run into the summary and audit it against the
    /// previous totals
    ///
    /// Page conservation is only checked when the run audited the version
    /// the summary last saw; a different version starts a new entry.
    pub fn apply(&mut self, version: &str, report: &mut Report) {
        let counters = report.counters;
        let current = VersionSummary {
            total_page_count: counters.current_pages,
            total_code_count: counters.incoming_examples,
            last_updated: Utc::now(),
        };

        let previous = match self.latest_version() {
            None => current,
            Some((latest, summary)) => {
                let summary = *summary;
                if latest == version {
                    let expected = (summary.total_page_count + counters.new_pages)
                        .saturating_sub(counters.removed_pages);
                    if expected != counters.current_pages {
                        report.issue(Issue::PageCountIssue {
                            project: self.project.clone(),
                            expected,
                            actual: counters.current_pages,
                        });
                    }
                }
                summary
            }
        };
        self.versions.insert(version.to_string(), current);

        if previous.total_code_count != current.total_code_count {
            report.change(Change::ProjectSummaryCodeCountChange {
                project: self.project.clone(),
                was: previous.total_code_count,
                now: current.total_code_count,
            });
        }
        report.check_count(
            &format!("Project {}", self.project),
            counters.incoming_examples,
            counters.classified_examples(),
        );
        if previous.total_page_count != current.total_page_count {
            report.change(Change::ProjectSummaryPageCountChange {
                project: self.project.clone(),
                was: previous.total_page_count,
                now: current.total_page_count,
            });
        }
    }
}
