//! SQLite storage layer for docaudit
//!
//! This module handles persistent storage of:
//! - Page records, including their full example history
//! - Per-project version summaries
//! - Reports of finished audit runs
//!
//! Records are kept as JSON documents; the columns next to them exist for
//! filtering and quick counts.

mod schema;

pub use schema::SCHEMA;

use crate::audit::ProjectSummary;
use crate::record::{ExampleRecord, PageRecord};
use crate::report::ProjectReport;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;

/// Split a page's examples into those still on the page and those already
/// removed, keeping their relative order
pub fn split_active_and_removed(records: Vec<ExampleRecord>) -> (Vec<ExampleRecord>, Vec<ExampleRecord>) {
    records.into_iter().partition(|r| !r.is_removed)
}

/// Database connection wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", path.as_ref()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn initialize(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    // ==================== Pages ====================

    /// Get a stored page, removed or not
    pub fn get_page(&self, project: &str, id: &str) -> Result<Option<PageRecord>> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document FROM pages WHERE project = ?1 AND id = ?2",
                params![project, id],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to get page {}", id))?;

        document
            .map(|doc| {
                serde_json::from_str(&doc).with_context(|| format!("Corrupt page document for {}", id))
            })
            .transpose()
    }

    /// Ids of the project's pages that are not marked removed
    pub fn page_ids(&self, project: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM pages WHERE project = ?1 AND removed = 0 ORDER BY id")?;

        let ids = stmt
            .query_map(params![project], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .context("Failed to list page ids")?;

        Ok(ids)
    }

    /// All stored pages, optionally limited to one project
    pub fn pages(&self, project: Option<&str>) -> Result<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT document FROM pages WHERE (?1 IS NULL OR project = ?1) ORDER BY project, id",
        )?;

        let documents = stmt
            .query_map(params![project], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list pages")?;

        documents
            .iter()
            .map(|doc| serde_json::from_str(doc).context("Corrupt page document"))
            .collect()
    }

    /// Write a project's new and updated pages plus its summary in one
    /// transaction
    pub fn batch_replace(
        &self,
        project: &str,
        new_pages: &[PageRecord],
        updated_pages: &[PageRecord],
        summary: &ProjectSummary,
    ) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to start batch transaction")?;

        for page in new_pages.iter().chain(updated_pages) {
            upsert_page(&tx, project, page)?;
        }

        tx.execute(
            r#"
            INSERT INTO project_summaries (project, document, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(project) DO UPDATE SET
                document = excluded.document,
                updated_at = datetime('now')
            "#,
            params![project, serde_json::to_string(summary)?],
        )
        .context("Failed to write project summary")?;

        tx.commit().context("Failed to commit batch")?;

        tracing::debug!(
            "Wrote {} new and {} updated pages for {}",
            new_pages.len(),
            updated_pages.len(),
            project
        );
        Ok(())
    }

    // ==================== Project Summaries ====================

    pub fn get_project_summary(&self, project: &str) -> Result<Option<ProjectSummary>> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document FROM project_summaries WHERE project = ?1",
                params![project],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to get project summary")?;

        document
            .map(|doc| serde_json::from_str(&doc).context("Corrupt project summary document"))
            .transpose()
    }

    // ==================== Audit Runs ====================

    /// Store a finished run's report
    pub fn record_run(&self, report: &ProjectReport) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO audit_runs (id, project, version, report, started_at, completed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    report.run_id.to_string(),
                    report.project,
                    report.version,
                    serde_json::to_string(report)?,
                    report.started_at.to_rfc3339(),
                    report.completed_at.map(|t| t.to_rfc3339()),
                ],
            )
            .context("Failed to record audit run")?;
        Ok(())
    }

    /// The most recently started run, optionally for one project
    pub fn latest_run(&self, project: Option<&str>) -> Result<Option<ProjectReport>> {
        let document: Option<String> = self
            .conn
            .query_row(
                r#"
                SELECT report FROM audit_runs
                WHERE (?1 IS NULL OR project = ?1)
                ORDER BY started_at DESC
                LIMIT 1
                "#,
                params![project],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to get latest audit run")?;

        document
            .map(|doc| serde_json::from_str(&doc).context("Corrupt audit run report"))
            .transpose()
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self, project: Option<&str>) -> Result<DatabaseStats> {
        let mut stats = DatabaseStats::default();

        for page in self.pages(project)? {
            if page.is_removed {
                stats.removed_pages += 1;
            } else {
                stats.pages += 1;
            }
            for example in &page.examples {
                if example.is_removed {
                    stats.removed_examples += 1;
                } else {
                    stats.active_examples += example.occurrences();
                }
            }
        }

        let runs: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM audit_runs WHERE (?1 IS NULL OR project = ?1)",
            params![project],
            |row| row.get(0),
        )?;
        stats.runs = runs as usize;

        Ok(stats)
    }
}

fn upsert_page(tx: &Transaction<'_>, project: &str, page: &PageRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO pages (project, id, url, removed, code_examples_total, document, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
        ON CONFLICT(project, id) DO UPDATE SET
            url = excluded.url,
            removed = excluded.removed,
            code_examples_total = excluded.code_examples_total,
            document = excluded.document,
            updated_at = datetime('now')
        "#,
        params![
            project,
            page.id,
            page.url,
            page.is_removed,
            page.code_examples_total as i64,
            serde_json::to_string(page)?,
        ],
    )
    .with_context(|| format!("Failed to write page {}", page.id))?;
    Ok(())
}

/// Database statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DatabaseStats {
    pub pages: usize,
    pub removed_pages: usize,
    /// Active example occurrences
    pub active_examples: usize,
    pub removed_examples: usize,
    pub runs: usize,
}
