//! Typed errors for failures that callers branch on
//!
//! Most fallible functions return `anyhow::Result`; these variants are the
//! ones worth matching on (e.g. to decide whether a page is aborted).

use thiserror::Error;

/// Errors raised by the audit pipeline
#[derive(Debug, Error)]
pub enum AuditError {
    /// A fuzzy-match threshold outside of `(0, 100]`
    #[error("invalid fuzzy-match threshold {0}: must be greater than 0 and at most 100")]
    InvalidThreshold(f64),

    /// The categorization backend did not answer in time
    #[error("categorization timed out after {seconds}s")]
    CategorizeTimeout { seconds: u64 },

    /// The categorization backend returned an error
    #[error("categorization failed: {0}")]
    Categorize(String),

    /// A raw page id without any path segments after the project prefix
    #[error("page id {0:?} has no path segments after the project prefix")]
    InvalidPageId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AuditError::InvalidThreshold(120.0);
        assert!(err.to_string().contains("120"));

        let err = AuditError::CategorizeTimeout { seconds: 30 };
        assert_eq!(err.to_string(), "categorization timed out after 30s");
    }
}
