//! Reconciliation of a page's incoming examples against its stored records
//!
//! This module handles:
//! - Measuring how much an example changed (character-level diff)
//! - Classifying each incoming example as new, updated, or unchanged
//! - Aggregating a page's classifications with duplicate-aware counting
//! - Building the next version of a page's example records
//! - Driving a whole page through the right reconciliation path
//!
//! The engine is synchronous apart from categorization calls. All mutable
//! matching state lives inside a single page's reconciliation.

mod aggregator;
mod builder;
mod classifier;
mod page;
mod similarity;

pub use aggregator::{aggregate, Buckets, Match, MatchPool};
pub use builder::RecordBuilder;
pub use classifier::{classify, Classification};
pub use page::{PageOutcome, PageReconciler, PageState};
pub use similarity::{is_update, percent_changed, FULLY_CHANGED};

use crate::error::AuditError;
use serde::{Deserialize, Serialize};

/// Change percentage below which an edited example counts as updated
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 30.0;

/// How the classifier picks among several records an example is close to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The record with the smallest change percentage; earlier records win ties
    #[default]
    SmallestChange,
    /// The first record under the threshold, in stored order
    FirstMatch,
}

/// What to do when categorizing a new example fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorizeFailure {
    /// Store the example as uncategorized and report an issue
    #[default]
    Fallback,
    /// Fail the page; its stored record is left untouched
    AbortPage,
}

/// Fuzzy-matching parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    pub threshold: f64,
    pub tie_break: TieBreak,
}

impl MatchPolicy {
    /// Policy with a validated threshold in `(0, 100]`
    pub fn new(threshold: f64) -> Result<Self, AuditError> {
        if !(threshold > 0.0 && threshold <= 100.0) {
            return Err(AuditError::InvalidThreshold(threshold));
        }

        Ok(Self {
            threshold,
            tie_break: TieBreak::default(),
        })
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_FUZZY_THRESHOLD,
            tie_break: TieBreak::default(),
        }
    }
}

/// Where an example ended up after reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    New,
    Updated,
    Unchanged,
    Removed,
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bucket::New => write!(f, "new"),
            Bucket::Updated => write!(f, "updated"),
            Bucket::Unchanged => write!(f, "unchanged"),
            Bucket::Removed => write!(f, "removed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_threshold_validation() {
        assert!(MatchPolicy::new(30.0).is_ok());
        assert!(MatchPolicy::new(100.0).is_ok());
        assert!(matches!(
            MatchPolicy::new(0.0),
            Err(AuditError::InvalidThreshold(_))
        ));
        assert!(MatchPolicy::new(100.5).is_err());
        assert!(MatchPolicy::new(f64::NAN).is_err());
    }

    #[test]
    fn test_default_policy() {
        let policy = MatchPolicy::default();
        assert_eq!(policy.threshold, DEFAULT_FUZZY_THRESHOLD);
        assert_eq!(policy.tie_break, TieBreak::SmallestChange);
    }
}
