//! SQL migration definitions for the pressfeat database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as one batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: raw_documents, results, runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Scraped press releases. `status` is the processed marker: NULL until the
-- document has been visited by a pass, then one of persisted/skipped/failed.
CREATE TABLE IF NOT EXISTS raw_documents (
    id           TEXT PRIMARY KEY,
    link         TEXT NOT NULL,
    source       TEXT NOT NULL,
    body_html    TEXT NOT NULL,
    page_html    TEXT NOT NULL,
    imported_at  TEXT NOT NULL,
    status       TEXT,
    processed_at TEXT,
    failure      TEXT,
    run_id       TEXT
);

CREATE INDEX IF NOT EXISTS idx_raw_documents_source_status ON raw_documents(source, status);

-- Feature records, one per persisted document
CREATE TABLE IF NOT EXISTS results (
    id          TEXT PRIMARY KEY,
    source      TEXT NOT NULL,
    record_json TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    run_id      TEXT
);

CREATE INDEX IF NOT EXISTS idx_results_source ON results(source);

-- Pass history
CREATE TABLE IF NOT EXISTS runs (
    id          TEXT PRIMARY KEY,
    source      TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
