//! Page-level reconciliation state machine

use super::aggregator::aggregate;
use super::builder::RecordBuilder;
use super::{CategorizeFailure, MatchPolicy};
use crate::categorize::Categorizer;
use crate::extract::IncomingPage;
use crate::record::{empty_breakdown, language_breakdown, ExampleRecord, PageRecord};
use crate::report::{Change, Report};
use crate::storage::split_active_and_removed;
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Which reconciliation path a page takes, from whether it has active
/// stored examples and incoming examples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Neither side has examples
    Empty,
    /// Every active example left the page
    AllRemoved,
    /// Nothing stored yet, everything incoming is new
    AllNew,
    /// Both sides have examples
    Reconcile,
}

impl PageState {
    pub fn of(has_active: bool, has_incoming: bool) -> Self {
        match (has_active, has_incoming) {
            (false, false) => PageState::Empty,
            (true, false) => PageState::AllRemoved,
            (false, true) => PageState::AllNew,
            (true, true) => PageState::Reconcile,
        }
    }
}

/// Result of reconciling one page
#[derive(Debug, Clone)]
pub struct PageOutcome {
    /// The page to write, or `None` when nothing changed
    pub page: Option<PageRecord>,
    pub report: Report,
}

/// Reconciles pages one at a time
///
/// Every call produces its own [`Report`]; nothing is shared between pages.
pub struct PageReconciler<'a> {
    policy: MatchPolicy,
    categorizer: &'a dyn Categorizer,
    on_categorize_error: CategorizeFailure,
    primary_language_project: bool,
}

impl<'a> PageReconciler<'a> {
    pub fn new(policy: MatchPolicy, categorizer: &'a dyn Categorizer) -> Self {
        Self {
            policy,
            categorizer,
            on_categorize_error: CategorizeFailure::default(),
            primary_language_project: false,
        }
    }

    pub fn on_categorize_error(mut self, policy: CategorizeFailure) -> Self {
        self.on_categorize_error = policy;
        self
    }

    pub fn primary_language_project(mut self, primary: bool) -> Self {
        self.primary_language_project = primary;
        self
    }

    fn builder(&self, now: DateTime<Utc>) -> RecordBuilder<'a> {
        RecordBuilder::new(self.categorizer, now)
            .on_categorize_error(self.on_categorize_error)
            .primary_language_project(self.primary_language_project)
    }

    /// Build a page that has no stored record
    pub async fn create_page(&self, incoming: &IncomingPage, project: &str) -> Result<PageOutcome> {
        let now = Utc::now();
        let mut report = Report::default();
        count_incoming(&mut report, incoming);
        report.counters.new_pages += 1;

        let examples = self
            .builder(now)
            .build_new(&incoming.id, &incoming.examples, &mut report)
            .await?;

        let mut page = PageRecord {
            id: incoming.id.clone(),
            url: incoming.url.clone(),
            project: project.to_string(),
            code_examples_total: 0,
            literal_includes_total: incoming.literal_includes.len(),
            io_code_blocks_total: incoming.io_code_blocks.len(),
            languages: language_breakdown(&examples, &incoming.literal_includes, &incoming.io_code_blocks),
            keywords: incoming.keywords.clone(),
            examples,
            date_added: now,
            date_last_updated: now,
            is_removed: false,
            date_removed: None,
        };
        page.code_examples_total = page.active_occurrences();

        tracing::info!("New page {} with {} code examples", page.id, page.code_examples_total);
        report.change(Change::PageCreated {
            page_id: page.id.clone(),
        });

        Ok(PageOutcome {
            page: Some(page),
            report,
        })
    }

    /// Reconcile a stored page against its incoming version
    pub async fn update_existing_page(
        &self,
        existing: &PageRecord,
        incoming: &IncomingPage,
    ) -> Result<PageOutcome> {
        let now = Utc::now();
        let mut report = Report::default();
        count_incoming(&mut report, incoming);
        count_existing(&mut report, existing);

        let mut page = existing.clone();
        page.url = incoming.url.clone();
        page.is_removed = false;
        page.date_removed = None;

        if incoming.keywords.len() != existing.keywords.len() {
            page.keywords = incoming.keywords.clone();
            report.change(Change::KeywordsUpdated {
                page_id: page.id.clone(),
            });
        }

        let (active, removed) = split_active_and_removed(existing.examples.clone());
        let state = PageState::of(!active.is_empty(), !incoming.examples.is_empty());
        tracing::debug!("Page {} takes the {:?} path", page.id, state);

        match state {
            PageState::Empty => {}
            PageState::AllRemoved => {
                page.examples = remove_all(&page.id, active, removed, now, &mut report);
            }
            PageState::AllNew => {
                let mut examples = self
                    .builder(now)
                    .build_new(&page.id, &incoming.examples, &mut report)
                    .await?;
                examples.extend(removed);
                page.examples = examples;
            }
            PageState::Reconcile => {
                let buckets = aggregate(&active, &incoming.examples, &self.policy);
                page.examples = self
                    .builder(now)
                    .build(&page.id, &active, removed, &incoming.examples, &buckets, &mut report)
                    .await?;
            }
        }

        if state == PageState::AllRemoved {
            page.code_examples_total = 0;
            page.literal_includes_total = 0;
            page.io_code_blocks_total = 0;
            page.languages = empty_breakdown();
        } else {
            page.code_examples_total = page.active_occurrences();
            page.literal_includes_total = incoming.literal_includes.len();
            page.io_code_blocks_total = incoming.io_code_blocks.len();
            page.languages =
                language_breakdown(&page.examples, &incoming.literal_includes, &incoming.io_code_blocks);
        }

        if page.same_content(existing) {
            return Ok(PageOutcome { page: None, report });
        }

        report_count_changes(&mut report, existing, &page);
        page.date_last_updated = now;

        // A page coming back after removal counts as new to the project
        if existing.is_removed {
            report.counters.new_pages += 1;
            report.change(Change::PageCreated {
                page_id: page.id.clone(),
            });
            tracing::info!("Page {} is back", page.id);
        } else {
            report.counters.updated_pages += 1;
            report.change(Change::PageUpdated {
                page_id: page.id.clone(),
            });
            tracing::info!("Updated page {}", page.id);
        }

        Ok(PageOutcome {
            page: Some(page),
            report,
        })
    }

    /// Flag a stored page as gone from the project
    ///
    /// Its active examples are marked removed and its counts drop to zero;
    /// the record itself is kept.
    pub fn remove_page(&self, existing: &PageRecord) -> PageOutcome {
        let now = Utc::now();
        let mut report = Report::default();
        count_existing(&mut report, existing);

        let mut page = existing.clone();
        let (active, removed) = split_active_and_removed(existing.examples.clone());
        page.examples = remove_all(&page.id, active, removed, now, &mut report);
        page.code_examples_total = 0;
        page.literal_includes_total = 0;
        page.io_code_blocks_total = 0;
        page.languages = empty_breakdown();
        page.is_removed = true;
        page.date_removed = Some(now);
        page.date_last_updated = now;

        report.counters.removed_pages += 1;
        report.change(Change::PageRemoved {
            page_id: page.id.clone(),
        });
        tracing::info!("Removed page {}", page.id);

        PageOutcome {
            page: Some(page),
            report,
        }
    }
}

fn count_incoming(report: &mut Report, incoming: &IncomingPage) {
    report.counters.incoming_examples += incoming.examples.len();
    report.counters.incoming_literal_includes += incoming.literal_includes.len();
    report.counters.incoming_io_code_blocks += incoming.io_code_blocks.len();
}

fn count_existing(report: &mut Report, existing: &PageRecord) {
    report.counters.existing_examples += existing.active_occurrences();
    report.counters.existing_literal_includes += existing.literal_includes_total;
    report.counters.existing_io_code_blocks += existing.io_code_blocks_total;
}

/// Mark every active record removed, keeping earlier removals after them
fn remove_all(
    page_id: &str,
    active: Vec<ExampleRecord>,
    previously_removed: Vec<ExampleRecord>,
    now: DateTime<Utc>,
    report: &mut Report,
) -> Vec<ExampleRecord> {
    let count: usize = active.iter().map(ExampleRecord::occurrences).sum();

    let mut records: Vec<ExampleRecord> = active
        .into_iter()
        .map(|mut record| {
            record.mark_removed(now);
            record
        })
        .collect();
    records.extend(previously_removed);

    if count > 0 {
        report.counters.removed_examples += count;
        report.change(Change::CodeExampleRemoved {
            page_id: page_id.to_string(),
            count,
        });
    }

    records
}

fn report_count_changes(report: &mut Report, before: &PageRecord, after: &PageRecord) {
    let page_id = after.id.clone();

    if before.code_examples_total != after.code_examples_total {
        report.change(Change::CodeExampleCountChange {
            page_id: page_id.clone(),
            was: before.code_examples_total,
            now: after.code_examples_total,
        });
    }
    if before.literal_includes_total != after.literal_includes_total {
        report.change(Change::LiteralIncludeCountChange {
            page_id: page_id.clone(),
            was: before.literal_includes_total,
            now: after.literal_includes_total,
        });
    }
    if before.io_code_blocks_total != after.io_code_blocks_total {
        report.change(Change::IoCodeBlockCountChange {
            page_id,
            was: before.io_code_blocks_total,
            now: after.io_code_blocks_total,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::{Category, MockCategorizer};
    use crate::extract::IncomingExample;
    use crate::record::test_support::{page, record};

    fn incoming_page(id: &str, codes: &[&str]) -> IncomingPage {
        IncomingPage::new(id, format!("https://docs.example.com/{}", id.replace('|', "/")))
            .with_examples(codes.iter().map(|c| IncomingExample::new(*c, "python")).collect())
    }

    #[test]
    fn test_page_state() {
        assert_eq!(PageState::of(false, false), PageState::Empty);
        assert_eq!(PageState::of(true, false), PageState::AllRemoved);
        assert_eq!(PageState::of(false, true), PageState::AllNew);
        assert_eq!(PageState::of(true, true), PageState::Reconcile);
    }

    #[tokio::test]
    async fn test_create_page() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let reconciler = PageReconciler::new(MatchPolicy::default(), &categorizer);

        let outcome = reconciler
            .create_page(&incoming_page("crud|insert", &["x = 1", "x = 1"]), "manual")
            .await
            .unwrap();

        let page = outcome.page.unwrap();
        assert_eq!(page.project, "manual");
        assert_eq!(page.examples.len(), 1);
        assert_eq!(page.code_examples_total, 2);
        assert_eq!(page.languages["python"].total, 2);
        assert_eq!(outcome.report.counters.new_pages, 1);
        assert_eq!(outcome.report.counters.new_examples, 2);
    }

    #[tokio::test]
    async fn test_first_example_on_stored_page() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let reconciler = PageReconciler::new(MatchPolicy::default(), &categorizer);
        let existing = page("crud|insert", Vec::new());

        let outcome = reconciler
            .update_existing_page(&existing, &incoming_page("crud|insert", &["x = 1"]))
            .await
            .unwrap();

        let updated = outcome.page.unwrap();
        assert_eq!(updated.code_examples_total, 1);
        assert_eq!(outcome.report.counters.new_examples, 1);
        assert_eq!(outcome.report.counters.updated_pages, 1);
        assert!(outcome.report.changes.contains(&Change::CodeExampleCountChange {
            page_id: "crud|insert".to_string(),
            was: 0,
            now: 1,
        }));
    }

    #[tokio::test]
    async fn test_all_examples_removed() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let reconciler = PageReconciler::new(MatchPolicy::default(), &categorizer);
        let existing = page("crud|insert", vec![record("x = 1", "python")]);

        let outcome = reconciler
            .update_existing_page(&existing, &incoming_page("crud|insert", &[]))
            .await
            .unwrap();

        let updated = outcome.page.unwrap();
        assert_eq!(updated.examples.len(), 1);
        assert!(updated.examples[0].is_removed);
        assert_eq!(updated.code_examples_total, 0);
        assert_eq!(updated.languages["python"].total, 0);
        assert_eq!(outcome.report.counters.removed_examples, 1);
    }

    #[tokio::test]
    async fn test_all_removed_zeroes_include_totals() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let reconciler = PageReconciler::new(MatchPolicy::default(), &categorizer);
        let mut existing = page("crud|insert", vec![record("x = 1", "python")]);
        existing.literal_includes_total = 1;
        let mut incoming = incoming_page("crud|insert", &[]);
        incoming.literal_includes = vec!["python".to_string()];
        incoming.io_code_blocks = vec!["shell".to_string()];

        let outcome = reconciler
            .update_existing_page(&existing, &incoming)
            .await
            .unwrap();

        let updated = outcome.page.unwrap();
        assert_eq!(updated.code_examples_total, 0);
        assert_eq!(updated.literal_includes_total, 0);
        assert_eq!(updated.io_code_blocks_total, 0);
        assert_eq!(updated.languages, empty_breakdown());
        assert!(updated.examples[0].is_removed);
    }

    #[tokio::test]
    async fn test_unchanged_page_is_not_rewritten() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let reconciler = PageReconciler::new(MatchPolicy::default(), &categorizer);
        let incoming = incoming_page("crud|insert", &["x = 1", "1234567891", "x = 1"]);
        let existing = page("crud|insert", vec![record("1234567890", "text")]);

        let first = reconciler
            .update_existing_page(&existing, &incoming)
            .await
            .unwrap();
        let stored = first.page.unwrap();

        let second = reconciler.update_existing_page(&stored, &incoming).await.unwrap();
        assert!(second.page.is_none());
        assert!(second.report.changes.is_empty());
        assert_eq!(second.report.counters.unchanged_examples, 3);
        assert_eq!(categorizer.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_page_keyword_update() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let reconciler = PageReconciler::new(MatchPolicy::default(), &categorizer);
        let existing = page("crud|insert", Vec::new());
        let incoming = incoming_page("crud|insert", &[])
            .with_keywords(vec!["go".to_string(), "crud".to_string()]);

        let outcome = reconciler
            .update_existing_page(&existing, &incoming)
            .await
            .unwrap();

        let updated = outcome.page.unwrap();
        assert_eq!(updated.keywords, vec!["go", "crud"]);
        assert!(outcome.report.changes.contains(&Change::KeywordsUpdated {
            page_id: "crud|insert".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_categorize_abort_fails_page() {
        let categorizer = MockCategorizer::failing();
        let reconciler = PageReconciler::new(MatchPolicy::default(), &categorizer)
            .on_categorize_error(CategorizeFailure::AbortPage);

        let result = reconciler
            .create_page(&incoming_page("crud|insert", &["x = 1"]), "manual")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_removed_page_comes_back() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let reconciler = PageReconciler::new(MatchPolicy::default(), &categorizer);
        let existing = page("crud|insert", vec![record("x = 1", "python")]);
        let removed = reconciler.remove_page(&existing).page.unwrap();

        let outcome = reconciler
            .update_existing_page(&removed, &incoming_page("crud|insert", &["x = 1"]))
            .await
            .unwrap();

        let revived = outcome.page.unwrap();
        assert!(!revived.is_removed);
        assert_eq!(revived.code_examples_total, 1);
        assert_eq!(outcome.report.counters.new_pages, 1);
        assert_eq!(outcome.report.counters.updated_pages, 0);
        assert_eq!(outcome.report.counters.new_examples, 1);
        assert_eq!(revived.examples.len(), 2);
    }

    #[test]
    fn test_remove_page() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let reconciler = PageReconciler::new(MatchPolicy::default(), &categorizer);
        let mut old = record("legacy()", "python");
        old.mark_removed(Utc::now());
        let mut dup = record("x = 1", "python");
        dup.set_occurrences(2);
        let existing = page("crud|insert", vec![dup, old.clone()]);

        let outcome = reconciler.remove_page(&existing);

        let removed = outcome.page.unwrap();
        assert!(removed.is_removed);
        assert!(removed.date_removed.is_some());
        assert!(removed.examples.iter().all(|e| e.is_removed));
        assert_eq!(removed.examples[1], old);
        assert_eq!(removed.code_examples_total, 0);
        assert_eq!(outcome.report.counters.removed_pages, 1);
        assert_eq!(outcome.report.counters.removed_examples, 2);
    }
}
