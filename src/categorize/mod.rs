//! Example categorization
//!
//! This module handles:
//! - The category vocabulary stored on example records
//! - Deterministic rules that categorize common shapes of example
//! - Model-assisted categorization for everything the rules miss
//!
//! Categorizers are handed to reconciliation as `&dyn Categorizer`, so the
//! engine never knows whether a call hits a model or a rule table.

mod client;
mod prompts;
pub mod rules;

pub use client::{CompletionClient, LlmClient, LlmConfig, LlmResponse, MockLlmClient};
pub use prompts::CategoryPrompt;
pub use rules::{match_rules, LanguageFamily};

use crate::error::AuditError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Category of a code example
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Syntax example")]
    SyntaxExample,
    #[serde(rename = "Non-MongoDB command")]
    NonMongoCommand,
    #[serde(rename = "Example return object")]
    ExampleReturnObject,
    #[serde(rename = "Example configuration object")]
    ExampleConfigurationObject,
    #[serde(rename = "Usage example")]
    UsageExample,
    #[serde(rename = "Uncategorized")]
    Uncategorized,
}

impl Category {
    /// Categories a model may answer with
    pub const ASSIGNABLE: [Category; 5] = [
        Category::SyntaxExample,
        Category::NonMongoCommand,
        Category::ExampleReturnObject,
        Category::ExampleConfigurationObject,
        Category::UsageExample,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::SyntaxExample => "Syntax example",
            Category::NonMongoCommand => "Non-MongoDB command",
            Category::ExampleReturnObject => "Example return object",
            Category::ExampleConfigurationObject => "Example configuration object",
            Category::UsageExample => "Usage example",
            Category::Uncategorized => "Uncategorized",
        }
    }

    /// Parse a model answer, which must name one category exactly
    /// (ignoring case, surrounding whitespace, quotes, and a trailing period)
    pub fn from_answer(answer: &str) -> Option<Self> {
        let cleaned = answer
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
            .trim_end_matches('.')
            .trim();

        Self::ASSIGNABLE
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(cleaned))
    }

    /// Interpret a category declared by the page source, which tends to be
    /// loosely spelled ("usage", "return example", "third party command")
    pub fn from_declared(declared: &str) -> Option<Self> {
        let lower = declared.to_lowercase();

        if lower.contains("syntax") {
            Some(Category::SyntaxExample)
        } else if lower.contains("usage") {
            Some(Category::UsageExample)
        } else if lower.contains("return") {
            Some(Category::ExampleReturnObject)
        } else if lower.contains("configuration") {
            Some(Category::ExampleConfigurationObject)
        } else if lower.contains("command") {
            Some(Category::NonMongoCommand)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of categorizing one example
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryAssignment {
    pub category: Category,
    /// Whether a model made the call
    pub llm_categorized: bool,
}

impl CategoryAssignment {
    pub fn by_rule(category: Category) -> Self {
        Self {
            category,
            llm_categorized: false,
        }
    }

    pub fn by_model(category: Category) -> Self {
        Self {
            category,
            llm_categorized: true,
        }
    }
}

/// Assigns a category to a newly seen example
#[async_trait::async_trait]
pub trait Categorizer: Send + Sync {
    /// Categorize trimmed example code in a canonical language
    async fn categorize(
        &self,
        code: &str,
        language: &str,
        primary_language_project: bool,
    ) -> Result<CategoryAssignment>;
}

/// Rules only; unmatched examples stay uncategorized
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleCategorizer;

#[async_trait::async_trait]
impl Categorizer for RuleCategorizer {
    async fn categorize(
        &self,
        code: &str,
        language: &str,
        _primary_language_project: bool,
    ) -> Result<CategoryAssignment> {
        let category = match_rules(code, LanguageFamily::of(language)).unwrap_or(Category::Uncategorized);
        Ok(CategoryAssignment::by_rule(category))
    }
}

/// Rules first, then a completion model under a deadline
pub struct LlmCategorizer {
    client: Box<dyn CompletionClient>,
    timeout: Duration,
}

impl LlmCategorizer {
    pub fn new(client: impl CompletionClient + 'static, timeout: Duration) -> Self {
        Self {
            client: Box::new(client),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl Categorizer for LlmCategorizer {
    async fn categorize(
        &self,
        code: &str,
        language: &str,
        primary_language_project: bool,
    ) -> Result<CategoryAssignment> {
        let family = LanguageFamily::of(language);
        if let Some(category) = match_rules(code, family) {
            return Ok(CategoryAssignment::by_rule(category));
        }

        let prompt = CategoryPrompt::for_family(family, primary_language_project).generate(code);

        let response = tokio::time::timeout(self.timeout, self.client.complete(&prompt))
            .await
            .map_err(|_| AuditError::CategorizeTimeout {
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| AuditError::Categorize(e.to_string()))?;

        let category = Category::from_answer(&response.content).unwrap_or_else(|| {
            tracing::debug!("Model answered with an unknown category: {:?}", response.content);
            Category::Uncategorized
        });

        Ok(CategoryAssignment::by_model(category))
    }
}

/// Fixed-answer categorizer for tests; counts its invocations
pub struct MockCategorizer {
    assignment: Option<CategoryAssignment>,
    calls: AtomicUsize,
}

impl MockCategorizer {
    /// Always answer `category`
    pub fn new(category: Category) -> Self {
        Self {
            assignment: Some(CategoryAssignment::by_model(category)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail
    pub fn failing() -> Self {
        Self {
            assignment: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Categorizer for MockCategorizer {
    async fn categorize(
        &self,
        _code: &str,
        _language: &str,
        _primary_language_project: bool,
    ) -> Result<CategoryAssignment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.assignment {
            Some(assignment) => Ok(assignment),
            None => Err(AuditError::Categorize("mock categorizer failure".to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_answer() {
        assert_eq!(Category::from_answer("Usage example"), Some(Category::UsageExample));
        assert_eq!(
            Category::from_answer("  \"example return object\".\n"),
            Some(Category::ExampleReturnObject)
        );
        assert_eq!(Category::from_answer("Uncategorized"), None);
        assert_eq!(Category::from_answer("It is a usage example"), None);
    }

    #[test]
    fn test_from_declared() {
        assert_eq!(Category::from_declared("Syntax Example"), Some(Category::SyntaxExample));
        assert_eq!(Category::from_declared("return object"), Some(Category::ExampleReturnObject));
        assert_eq!(
            Category::from_declared("configuration example"),
            Some(Category::ExampleConfigurationObject)
        );
        assert_eq!(
            Category::from_declared("third party command"),
            Some(Category::NonMongoCommand)
        );
        assert_eq!(Category::from_declared("some other category"), None);
    }

    #[tokio::test]
    async fn test_rule_categorizer() {
        let categorizer = RuleCategorizer;
        let assignment = categorizer.categorize("mkdir demo", "shell", false).await.unwrap();
        assert_eq!(assignment, CategoryAssignment::by_rule(Category::NonMongoCommand));

        let assignment = categorizer.categorize("x = compute()", "python", false).await.unwrap();
        assert_eq!(assignment.category, Category::Uncategorized);
        assert!(!assignment.llm_categorized);
    }

    #[tokio::test]
    async fn test_llm_categorizer_skips_model_on_rule_match() {
        let categorizer = LlmCategorizer::new(
            MockLlmClient::new("Syntax example"),
            Duration::from_secs(5),
        );

        let assignment = categorizer
            .categorize("npm install mongodb", "shell", false)
            .await
            .unwrap();
        assert_eq!(assignment, CategoryAssignment::by_rule(Category::NonMongoCommand));
    }

    #[tokio::test]
    async fn test_llm_categorizer_uses_model_answer() {
        let categorizer = LlmCategorizer::new(
            MockLlmClient::new("Syntax example"),
            Duration::from_secs(5),
        );

        let assignment = categorizer
            .categorize("coll.find(filter)", "java", true)
            .await
            .unwrap();
        assert_eq!(assignment, CategoryAssignment::by_model(Category::SyntaxExample));
    }

    #[tokio::test]
    async fn test_llm_categorizer_invalid_answer() {
        let categorizer = LlmCategorizer::new(
            MockLlmClient::new("I think this is a tutorial"),
            Duration::from_secs(5),
        );

        let assignment = categorizer
            .categorize("coll.find(filter)", "java", false)
            .await
            .unwrap();
        assert_eq!(assignment, CategoryAssignment::by_model(Category::Uncategorized));
    }

    #[tokio::test]
    async fn test_mock_categorizer_counts_calls() {
        let mock = MockCategorizer::new(Category::UsageExample);
        mock.categorize("a", "python", false).await.unwrap();
        mock.categorize("b", "python", false).await.unwrap();
        assert_eq!(mock.calls(), 2);

        let failing = MockCategorizer::failing();
        assert!(failing.categorize("a", "python", false).await.is_err());
    }
}
