//! Turning classification buckets into the next list of example records
//!
//! Occurrences are accumulated per fingerprint before any record is
//! emitted, so every active content appears in exactly one record and
//! repeated content is carried as `instances_on_page`.

use super::aggregator::Buckets;
use super::CategorizeFailure;
use crate::categorize::{Category, CategoryAssignment, Categorizer};
use crate::extract::{language, IncomingExample};
use crate::record::ExampleRecord;
use crate::report::{Change, Issue, Report};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// An active record under construction
struct Entry {
    record: ExampleRecord,
    occurrences: usize,
    /// Occurrences differ from what the source record carried
    touched: bool,
}

#[derive(Default)]
struct Accumulator {
    entries: Vec<Entry>,
    by_fingerprint: HashMap<String, usize>,
}

impl Accumulator {
    /// Add occurrences to an existing entry; false when there is none
    fn grow(&mut self, fingerprint: &str, count: usize) -> bool {
        match self.by_fingerprint.get(fingerprint) {
            Some(&index) => {
                let entry = &mut self.entries[index];
                entry.occurrences += count;
                entry.touched = true;
                true
            }
            None => false,
        }
    }

    fn insert(&mut self, record: ExampleRecord, occurrences: usize) {
        let touched = record.occurrences() != occurrences;
        self.by_fingerprint
            .insert(record.fingerprint.clone(), self.entries.len());
        self.entries.push(Entry {
            record,
            occurrences,
            touched,
        });
    }

    fn into_records(self, now: DateTime<Utc>) -> Vec<ExampleRecord> {
        self.entries
            .into_iter()
            .map(|mut entry| {
                if entry.touched {
                    entry.record.date_updated = Some(now);
                }
                entry.record.set_occurrences(entry.occurrences);
                entry.record
            })
            .collect()
    }
}

/// Count items per key in first-seen order, along with the index that
/// introduced each key
fn group_in_order<K, I>(items: I) -> Vec<(K, usize, usize)>
where
    K: Eq + std::hash::Hash + Clone,
    I: IntoIterator<Item = (K, usize)>,
{
    let mut groups: Vec<(K, usize, usize)> = Vec::new();
    let mut seen: HashMap<K, usize> = HashMap::new();

    for (key, index) in items {
        match seen.get(&key) {
            Some(&group) => groups[group].2 += 1,
            None => {
                seen.insert(key.clone(), groups.len());
                groups.push((key, index, 1));
            }
        }
    }

    groups
}

/// Builds a page's example records from its buckets
pub struct RecordBuilder<'a> {
    categorizer: &'a dyn Categorizer,
    on_categorize_error: CategorizeFailure,
    primary_language_project: bool,
    now: DateTime<Utc>,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(categorizer: &'a dyn Categorizer, now: DateTime<Utc>) -> Self {
        Self {
            categorizer,
            on_categorize_error: CategorizeFailure::default(),
            primary_language_project: false,
            now,
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

    /// Build records for a page with nothing stored yet
    pub async fn build_new(
        &self,
        page_id: &str,
        incoming: &[IncomingExample],
        report: &mut Report,
    ) -> Result<Vec<ExampleRecord>> {
        let buckets = Buckets::all_new(incoming.len());
        self.build(page_id, &[], Vec::new(), incoming, &buckets, report)
            .await
    }

    /// Build the full record list for a page
    ///
    /// `active` must be the slice the buckets were aggregated from. Records
    /// in `previously_removed` are appended untouched.
    ///
    /// The removed-examples counter counts occurrences, while the record
    /// list holds one removed copy per source record. A source record whose
    /// matched content folds into another record's entry is kept as a
    /// removed copy as well.
    pub async fn build(
        &self,
        page_id: &str,
        active: &[ExampleRecord],
        previously_removed: Vec<ExampleRecord>,
        incoming: &[IncomingExample],
        buckets: &Buckets,
        report: &mut Report,
    ) -> Result<Vec<ExampleRecord>> {
        let mut acc = Accumulator::default();
        // Source records that live on in an active entry
        let mut carried: BTreeSet<usize> = BTreeSet::new();
        // Source records whose occurrences went to another record's entry
        let mut folded: BTreeSet<usize> = BTreeSet::new();

        // Unchanged: per source record, in stored order
        let mut unchanged: BTreeMap<usize, usize> = BTreeMap::new();
        for m in &buckets.unchanged {
            *unchanged.entry(m.record).or_default() += 1;
        }
        for (&record, &count) in &unchanged {
            let source = &active[record];
            if acc.grow(&source.fingerprint, count) {
                folded.insert(record);
            } else {
                acc.insert(source.clone(), count);
                carried.insert(record);
            }
        }

        // Updated: one record per (source record, new content)
        let updates = group_in_order(
            buckets
                .updated
                .iter()
                .map(|m| ((m.record, incoming[m.incoming].fingerprint()), m.incoming)),
        );
        for ((record, fingerprint), first, count) in updates {
            if acc.grow(&fingerprint, count) {
                folded.insert(record);
                continue;
            }
            let mut updated = active[record].clone();
            updated.code = incoming[first].trimmed().to_string();
            updated.fingerprint = fingerprint;
            updated.date_updated = Some(self.now);
            acc.insert(updated, count);
            carried.insert(record);
        }

        // New: one record per distinct content
        let new_groups = group_in_order(buckets.new.iter().map(|&i| (incoming[i].fingerprint(), i)));
        for (fingerprint, first, count) in new_groups {
            if acc.grow(&fingerprint, count) {
                continue;
            }
            let example = &incoming[first];
            let assignment = self.assign_category(page_id, example, report).await?;
            let lang = example.language();
            let mut record = ExampleRecord {
                code: example.trimmed().to_string(),
                language: lang.to_string(),
                file_extension: language::file_extension(lang).to_string(),
                category: assignment.category,
                fingerprint,
                llm_categorized: assignment.llm_categorized,
                date_added: self.now,
                date_updated: None,
                date_removed: None,
                is_removed: false,
                instances_on_page: None,
            };
            record.set_occurrences(count);
            acc.insert(record, count);
        }

        let mut records = acc.into_records(self.now);
        let active_after: usize = records.iter().map(ExampleRecord::occurrences).sum();

        // Removed: one removed copy per source record with unmatched occurrences
        let mut removed: BTreeSet<usize> = buckets.removed.iter().copied().collect();
        for &record in folded.difference(&carried) {
            if removed.insert(record) {
                tracing::debug!("Record {} on page {} merged into another record", record, page_id);
            }
        }
        for &record in &removed {
            let mut gone = active[record].clone();
            gone.mark_removed(self.now);
            records.push(gone);
        }

        records.extend(previously_removed);

        let counters = &mut report.counters;
        counters.new_examples += buckets.new.len();
        counters.updated_examples += buckets.updated.len();
        counters.unchanged_examples += buckets.unchanged.len();
        counters.removed_examples += buckets.removed.len();

        let scope = format!("Page ID: {}", page_id);
        let active_before: usize = active.iter().map(ExampleRecord::occurrences).sum();
        report.check_count(&scope, incoming.len(), buckets.classified());
        report.check_count(&scope, active_before, buckets.removed.len() + buckets.matched());
        report.check_count(&scope, incoming.len(), active_after);

        if !buckets.new.is_empty() {
            report.change(Change::CodeExampleCreated {
                page_id: page_id.to_string(),
                count: buckets.new.len(),
            });
        }
        if !buckets.updated.is_empty() {
            report.change(Change::CodeExampleUpdated {
                page_id: page_id.to_string(),
                count: buckets.updated.len(),
            });
        }
        if !buckets.removed.is_empty() {
            report.change(Change::CodeExampleRemoved {
                page_id: page_id.to_string(),
                count: buckets.removed.len(),
            });
        }

        Ok(records)
    }

    async fn assign_category(
        &self,
        page_id: &str,
        example: &IncomingExample,
        report: &mut Report,
    ) -> Result<CategoryAssignment> {
        if let Some(category) = example.category.as_deref().and_then(Category::from_declared) {
            return Ok(CategoryAssignment::by_rule(category));
        }

        match self
            .categorizer
            .categorize(example.trimmed(), example.language(), self.primary_language_project)
            .await
        {
            Ok(assignment) => Ok(assignment),
            Err(e) => match self.on_categorize_error {
                CategorizeFailure::Fallback => {
                    tracing::warn!("Categorization failed on page {}: {:#}", page_id, e);
                    report.issue(Issue::CategorizationFailed {
                        page_id: page_id.to_string(),
                        reason: format!("{:#}", e),
                    });
                    Ok(CategoryAssignment::by_model(Category::Uncategorized))
                }
                CategorizeFailure::AbortPage => {
                    Err(e.context(format!("Failed to categorize an example on page {}", page_id)))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::MockCategorizer;
    use crate::reconcile::{aggregate, MatchPolicy};
    use crate::record::test_support::record;

    fn incoming(codes: &[&str]) -> Vec<IncomingExample> {
        codes
            .iter()
            .map(|c| IncomingExample::new(*c, "python"))
            .collect()
    }

    async fn reconcile(
        categorizer: &MockCategorizer,
        active: &[ExampleRecord],
        examples: &[IncomingExample],
        report: &mut Report,
    ) -> Vec<ExampleRecord> {
        let buckets = aggregate(active, examples, &MatchPolicy::default());
        RecordBuilder::new(categorizer, Utc::now())
            .build("page", active, Vec::new(), examples, &buckets, report)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_single_new_example() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let mut report = Report::default();
        let records = RecordBuilder::new(&categorizer, Utc::now())
            .build_new("page", &incoming(&["  x = 1\n"]), &mut report)
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, "x = 1");
        assert_eq!(records[0].language, "python");
        assert_eq!(records[0].file_extension, ".py");
        assert_eq!(records[0].category, Category::UsageExample);
        assert!(records[0].llm_categorized);
        assert_eq!(report.counters.new_examples, 1);
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_collapse() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let mut report = Report::default();
        let records = RecordBuilder::new(&categorizer, Utc::now())
            .build_new("page", &incoming(&["x = 1", "x = 1", "\nx = 1 "]), &mut report)
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].instances_on_page, Some(3));
        assert_eq!(categorizer.calls(), 1);
        assert_eq!(report.counters.new_examples, 3);
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn test_declared_category_skips_categorizer() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let mut report = Report::default();
        let examples = vec![IncomingExample::new("find(<filter>)", "javascript")
            .with_category("syntax example")];

        let records = RecordBuilder::new(&categorizer, Utc::now())
            .build_new("page", &examples, &mut report)
            .await
            .unwrap();

        assert_eq!(records[0].category, Category::SyntaxExample);
        assert!(!records[0].llm_categorized);
        assert_eq!(categorizer.calls(), 0);
    }

    #[tokio::test]
    async fn test_updated_record_keeps_identity() {
        let categorizer = MockCategorizer::new(Category::SyntaxExample);
        let mut original = record("1234567890", "text");
        original.category = Category::ExampleReturnObject;
        let added = original.date_added;
        let mut report = Report::default();

        let records = reconcile(&categorizer, &[original], &incoming(&["1234567891"]), &mut report).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, "1234567891");
        assert_eq!(records[0].category, Category::ExampleReturnObject);
        assert_eq!(records[0].date_added, added);
        assert!(records[0].date_updated.is_some());
        assert_eq!(categorizer.calls(), 0);
        assert_eq!(report.counters.updated_examples, 1);
    }

    #[tokio::test]
    async fn test_updated_duplicates_collapse() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let mut original = record("1234567890", "text");
        original.set_occurrences(2);
        let mut report = Report::default();

        let records = reconcile(
            &categorizer,
            &[original],
            &incoming(&["1234567891", "1234567891"]),
            &mut report,
        )
        .await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].instances_on_page, Some(2));
        assert_eq!(report.counters.updated_examples, 2);
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn test_surplus_duplicate_folds_into_record() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let active = vec![record("x = 1", "python")];
        let mut report = Report::default();

        let records = reconcile(&categorizer, &active, &incoming(&["x = 1", "x = 1"]), &mut report).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].instances_on_page, Some(2));
        assert!(records[0].date_updated.is_some());
        assert_eq!(categorizer.calls(), 0);
        assert_eq!(report.counters.unchanged_examples, 1);
        assert_eq!(report.counters.new_examples, 1);
    }

    #[tokio::test]
    async fn test_shortfall_emits_removed_copy() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let mut dup = record("x = 1", "python");
        dup.set_occurrences(3);
        let mut report = Report::default();

        let records = reconcile(&categorizer, &[dup], &incoming(&["x = 1"]), &mut report).await;

        assert_eq!(records.len(), 2);
        assert!(!records[0].is_removed);
        assert_eq!(records[0].occurrences(), 1);
        assert!(records[1].is_removed);
        assert_eq!(records[1].instances_on_page, None);
        assert_eq!(report.counters.removed_examples, 2);
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn test_update_merging_into_other_record_keeps_source() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let mut neighbour = record("1234567891", "text");
        neighbour.category = Category::ExampleReturnObject;
        let active = vec![record("1234567890", "text"), neighbour.clone()];
        let mut report = Report::default();

        let records = reconcile(
            &categorizer,
            &active,
            &incoming(&["1234567890", "1234567890"]),
            &mut report,
        )
        .await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].code, "1234567890");
        assert!(!records[0].is_removed);
        assert_eq!(records[0].instances_on_page, Some(2));

        assert!(records[1].is_removed);
        assert_eq!(records[1].code, neighbour.code);
        assert_eq!(records[1].category, Category::ExampleReturnObject);
        assert_eq!(records[1].date_added, neighbour.date_added);
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn test_removed_history_preserved() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let mut old = record("legacy()", "python");
        old.mark_removed(Utc::now());
        let active = vec![record("x = 1", "python")];
        let examples = incoming(&["x = 1"]);
        let buckets = aggregate(&active, &examples, &MatchPolicy::default());
        let mut report = Report::default();

        let records = RecordBuilder::new(&categorizer, Utc::now())
            .build("page", &active, vec![old.clone()], &examples, &buckets, &mut report)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1], old);
    }

    #[tokio::test]
    async fn test_categorize_failure_policies() {
        let failing = MockCategorizer::failing();
        let examples = incoming(&["x = 1"]);

        let mut report = Report::default();
        let records = RecordBuilder::new(&failing, Utc::now())
            .build_new("page", &examples, &mut report)
            .await
            .unwrap();
        assert_eq!(records[0].category, Category::Uncategorized);
        assert!(matches!(report.issues[0], Issue::CategorizationFailed { .. }));

        let mut report = Report::default();
        let result = RecordBuilder::new(&failing, Utc::now())
            .on_categorize_error(CategorizeFailure::AbortPage)
            .build_new("page", &examples, &mut report)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let categorizer = MockCategorizer::new(Category::UsageExample);
        let active = vec![record("1234567890", "text"), record("client.close()", "python")];
        let examples = incoming(&["1234567891", "x = 1", "x = 1"]);

        let mut first = Report::default();
        let records = reconcile(&categorizer, &active, &examples, &mut first).await;

        let (active, removed): (Vec<_>, Vec<_>) = records.iter().cloned().partition(|r| !r.is_removed);
        let buckets = aggregate(&active, &examples, &MatchPolicy::default());
        let mut second = Report::default();
        let again = RecordBuilder::new(&categorizer, Utc::now())
            .build("page", &active, removed, &examples, &buckets, &mut second)
            .await
            .unwrap();

        assert_eq!(again, records);
        assert_eq!(second.counters.unchanged_examples, examples.len());
        assert_eq!(second.counters.new_examples, 0);
        assert!(second.changes.is_empty());
        assert!(second.issues.is_empty());
    }
}
