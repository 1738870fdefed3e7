//! Incoming page content and fingerprinting
//!
//! This module handles:
//! - Content fingerprints used to match code examples across runs
//! - The incoming page model handed to reconciliation
//! - Loading page AST snapshots from disk and extracting their examples
//! - Language normalization

pub mod ast;
pub mod language;
mod source;

pub use ast::{extract_page, AstNode, PageSnapshot};
pub use source::{load_snapshots, snapshot_files};

use crate::error::AuditError;
use sha2::{Digest, Sha256};

/// Compute the fingerprint of an example's content
///
/// Leading and trailing whitespace is ignored, so re-indented or
/// re-wrapped blocks with identical bodies share a fingerprint.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// A code example as extracted from the current version of a page
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingExample {
    /// Raw code text, untrimmed
    pub code: String,
    /// Language as declared by the source, before normalization
    pub lang: String,
    /// Category declared by the source, if any
    pub category: Option<String>,
}

impl IncomingExample {
    pub fn new(code: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            lang: lang.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Code with surrounding whitespace removed; this is what gets stored
    pub fn trimmed(&self) -> &str {
        self.code.trim()
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.code)
    }

    /// Canonical language name
    pub fn language(&self) -> &'static str {
        language::normalize(&self.lang)
    }
}

/// The current version of a page, ready for reconciliation
#[derive(Debug, Clone, Default)]
pub struct IncomingPage {
    /// Stored page id (`path|to|page`)
    pub id: String,
    /// Production URL of the page
    pub url: String,
    /// Code examples in page order
    pub examples: Vec<IncomingExample>,
    /// Canonical language of each literal include
    pub literal_includes: Vec<String>,
    /// Canonical language of each io-code-block
    pub io_code_blocks: Vec<String>,
    /// Meta keywords
    pub keywords: Vec<String>,
    /// Whether the source flagged this page as deleted
    pub deleted: bool,
}

impl IncomingPage {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_examples(mut self, examples: Vec<IncomingExample>) -> Self {
        self.examples = examples;
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }
}

/// Convert a source page id (`project/user/branch/path/to/page`) into the
/// stored form (`path|to|page`)
pub fn page_id_from_source(raw: &str) -> Result<String, AuditError> {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() <= 3 {
        return Err(AuditError::InvalidPageId(raw.to_string()));
    }

    Ok(parts[3..].join("|"))
}

/// Production URL for a stored page id
pub fn page_url(site_url: &str, page_id: &str) -> String {
    format!(
        "{}/{}",
        site_url.trim_end_matches('/'),
        page_id.replace('|', "/")
    )
}
