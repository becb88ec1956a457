//! SQL migration definitions for the Postforge database.
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
        description: "Initial schema: documents",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Documents under enrichment. The source URL is the stable key:
-- the UNIQUE constraint is load-bearing for idempotent persistence.
CREATE TABLE IF NOT EXISTS documents (
    id                         TEXT PRIMARY KEY,
    url                        TEXT NOT NULL UNIQUE,
    title                      TEXT NOT NULL,
    author                     TEXT NOT NULL,
    published                  TEXT NOT NULL,
    excerpt                    TEXT NOT NULL,
    category                   TEXT,
    original_content           TEXT NOT NULL,
    content_hash               TEXT NOT NULL,
    formatted_original_content TEXT,
    updated_content            TEXT,
    sources_json               TEXT NOT NULL DEFAULT '[]',
    enrichment_model           TEXT,
    enriched_at                TEXT,
    quality_score              INTEGER NOT NULL DEFAULT 0,
    created_at                 TEXT NOT NULL,
    updated_at                 TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(created_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
