//! SQL migration definitions for the local cache database.
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
        description: "Initial schema: upload_cache, publications",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Content already uploaded, keyed by token address + content fragment
CREATE TABLE IF NOT EXISTS upload_cache (
    cache_key  TEXT PRIMARY KEY,
    content_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Every list version handed to the publisher
CREATE TABLE IF NOT EXISTS publications (
    id           TEXT PRIMARY KEY,
    list_name    TEXT NOT NULL,
    major        INTEGER NOT NULL,
    minor        INTEGER NOT NULL,
    patch        INTEGER NOT NULL,
    content_id   TEXT,
    sha256       TEXT NOT NULL,
    token_count  INTEGER NOT NULL,
    published_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_publications_list ON publications(list_name, published_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
