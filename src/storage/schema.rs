//! Database schema definition

/// SQL schema for the docaudit database
pub const SCHEMA: &str = r#"
-- One row per documentation page, the page record stored as JSON
CREATE TABLE IF NOT EXISTS pages (
    project TEXT NOT NULL,
    id TEXT NOT NULL,
    url TEXT NOT NULL,
    removed INTEGER NOT NULL DEFAULT 0,
    code_examples_total INTEGER NOT NULL DEFAULT 0,
    document TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (project, id)
);

CREATE INDEX IF NOT EXISTS idx_pages_project ON pages(project);
CREATE INDEX IF NOT EXISTS idx_pages_removed ON pages(project, removed);

-- Per-project, per-version page and code example totals
CREATE TABLE IF NOT EXISTS project_summaries (
    project TEXT PRIMARY KEY,
    document TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Finished audit runs and their reports
CREATE TABLE IF NOT EXISTS audit_runs (
    id TEXT PRIMARY KEY,
    project TEXT NOT NULL,
    version TEXT NOT NULL,
    report TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_audit_runs_project ON audit_runs(project, started_at);
"#;
