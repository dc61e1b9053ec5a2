//! SQL migration definitions for the enrichkit audit database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

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
        description: "Initial schema: enrichment_logs, step_completions",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Append-only audit trail, one row per logged step attempt
CREATE TABLE IF NOT EXISTS enrichment_logs (
    id             TEXT PRIMARY KEY,
    company_id     TEXT NOT NULL,
    company_domain TEXT NOT NULL,
    workflow_id    TEXT NOT NULL,
    workflow_slug  TEXT NOT NULL,
    play_name      TEXT NOT NULL,
    step_number    INTEGER NOT NULL,
    status         TEXT NOT NULL,
    batch_id       TEXT,
    result_table   TEXT,
    error_message  TEXT,
    stored_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_enrichment_logs_company ON enrichment_logs(company_id);
CREATE INDEX IF NOT EXISTS idx_enrichment_logs_workflow ON enrichment_logs(workflow_id);

-- Step completion markers; no uniqueness, repeated successes add rows
CREATE TABLE IF NOT EXISTS step_completions (
    id            TEXT PRIMARY KEY,
    company_id    TEXT NOT NULL,
    play_name     TEXT NOT NULL,
    step_number   INTEGER NOT NULL,
    workflow_slug TEXT NOT NULL,
    completed_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_step_completions_lookup
    ON step_completions(company_id, play_name, step_number);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
