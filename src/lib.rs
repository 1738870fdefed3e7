//! docaudit - Code example auditing for documentation projects
//!
//! This library reconciles the code examples found on documentation pages
//! against their stored history: matching unchanged and edited examples,
//! categorizing new ones, and keeping per-page and per-project totals that
//! every run checks for consistency.

pub mod audit;
pub mod categorize;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod reconcile;
pub mod record;
pub mod report;
pub mod storage;

/// Re-export commonly used types
pub use audit::{ProjectAuditor, ProjectDetails, ProjectSummary};
pub use config::AuditConfig;
pub use error::AuditError;
pub use reconcile::{MatchPolicy, PageReconciler};
pub use record::{ExampleRecord, PageRecord};
pub use report::{ProjectReport, Report};
pub use storage::Database;

/// Application-wide error type
pub use anyhow::Result;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "docaudit";
