//! Persisted page and example records
//!
//! A page record keeps every example it has ever carried. Removed examples
//! stay in the list with `is_removed` set so their history survives.

use crate::categorize::Category;
use crate::extract::language::{self, CANONICAL_LANGUAGES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored code example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleRecord {
    /// Trimmed code text
    pub code: String,
    /// Canonical language
    pub language: String,
    /// File extension for the language
    pub file_extension: String,
    /// Assigned category
    pub category: Category,
    /// Fingerprint of `code`
    pub fingerprint: String,
    /// Whether the category came from the model rather than a rule
    #[serde(default)]
    pub llm_categorized: bool,
    pub date_added: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_removed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_removed: bool,
    /// Number of identical occurrences on the page; absent means one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances_on_page: Option<usize>,
}

impl ExampleRecord {
    /// How many on-page occurrences this record stands for
    pub fn occurrences(&self) -> usize {
        match self.instances_on_page {
            Some(n) if n > 1 => n,
            _ => 1,
        }
    }

    /// Store an occurrence count, leaving the field unset for a single one
    pub fn set_occurrences(&mut self, count: usize) {
        self.instances_on_page = (count > 1).then_some(count);
    }

    /// Mark this record as no longer on the page
    pub fn mark_removed(&mut self, at: DateTime<Utc>) {
        self.is_removed = true;
        self.date_removed = Some(at);
        self.instances_on_page = None;
    }
}

/// Per-language directive and example counts for a page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageCounts {
    pub literal_includes: usize,
    pub io_code_blocks: usize,
    /// Active code examples in this language
    pub total: usize,
}

/// Counts for every canonical language
pub type LanguageBreakdown = BTreeMap<String, LanguageCounts>;

/// A breakdown with every canonical language at zero
pub fn empty_breakdown() -> LanguageBreakdown {
    CANONICAL_LANGUAGES
        .iter()
        .map(|lang| (lang.to_string(), LanguageCounts::default()))
        .collect()
}

/// Count active examples and directives per language
///
/// Removed examples are skipped. Languages outside the canonical set are
/// counted under `undefined`.
pub fn language_breakdown(
    examples: &[ExampleRecord],
    literal_includes: &[String],
    io_code_blocks: &[String],
) -> LanguageBreakdown {
    let mut breakdown = empty_breakdown();

    for example in examples.iter().filter(|e| !e.is_removed) {
        counts_for(&mut breakdown, &example.language).total += example.occurrences();
    }
    for lang in literal_includes {
        counts_for(&mut breakdown, lang).literal_includes += 1;
    }
    for lang in io_code_blocks {
        counts_for(&mut breakdown, lang).io_code_blocks += 1;
    }

    breakdown
}

fn counts_for<'a>(breakdown: &'a mut LanguageBreakdown, lang: &str) -> &'a mut LanguageCounts {
    let key = if breakdown.contains_key(lang) {
        lang
    } else {
        language::UNDEFINED
    };
    breakdown.entry(key.to_string()).or_default()
}

/// A stored documentation page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Page id (`path|to|page`)
    pub id: String,
    pub url: String,
    pub project: String,
    /// Active code example occurrences on the page
    pub code_examples_total: usize,
    pub literal_includes_total: usize,
    pub io_code_blocks_total: usize,
    pub languages: LanguageBreakdown,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Active and removed examples
    #[serde(default)]
    pub examples: Vec<ExampleRecord>,
    pub date_added: DateTime<Utc>,
    pub date_last_updated: DateTime<Utc>,
    /// Set when the page left the project; the record is kept for history
    #[serde(default)]
    pub is_removed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_removed: Option<DateTime<Utc>>,
}

impl PageRecord {
    /// Sum of occurrences over active examples
    pub fn active_occurrences(&self) -> usize {
        self.examples
            .iter()
            .filter(|e| !e.is_removed)
            .map(ExampleRecord::occurrences)
            .sum()
    }

    /// Whether two versions of a page carry the same content, ignoring
    /// timestamps
    pub fn same_content(&self, other: &PageRecord) -> bool {
        self.examples == other.examples
            && self.is_removed == other.is_removed
            && self.url == other.url
            && self.keywords == other.keywords
            && self.languages == other.languages
            && self.code_examples_total == other.code_examples_total
            && self.literal_includes_total == other.literal_includes_total
            && self.io_code_blocks_total == other.io_code_blocks_total
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::extract::{fingerprint, language};

    /// An active record for tests
    pub fn record(code: &str, lang: &str) -> ExampleRecord {
        ExampleRecord {
            code: code.trim().to_string(),
            language: language::normalize(lang).to_string(),
            file_extension: language::file_extension(lang).to_string(),
            category: Category::UsageExample,
            fingerprint: fingerprint(code),
            llm_categorized: false,
            date_added: Utc::now(),
            date_updated: None,
            date_removed: None,
            is_removed: false,
            instances_on_page: None,
        }
    }

    /// A page holding the given records
    pub fn page(id: &str, examples: Vec<ExampleRecord>) -> PageRecord {
        let now = Utc::now();
        let mut page = PageRecord {
            id: id.to_string(),
            url: format!("https://docs.example.com/{}", id.replace('|', "/")),
            project: "manual".to_string(),
            code_examples_total: 0,
            literal_includes_total: 0,
            io_code_blocks_total: 0,
            languages: language_breakdown(&examples, &[], &[]),
            keywords: Vec::new(),
            examples,
            date_added: now,
            date_last_updated: now,
            is_removed: false,
            date_removed: None,
        };
        page.code_examples_total = page.active_occurrences();
        page
    }
}
