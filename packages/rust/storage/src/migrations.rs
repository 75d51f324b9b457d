//! SQL migration definitions for the product store.
//!
//! Migrations are applied in order on open. Each migration has a version
//! number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: products",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Catalog entries; list fields are JSON text
CREATE TABLE IF NOT EXISTS products (
    id                    TEXT PRIMARY KEY,
    product_id            TEXT UNIQUE NOT NULL,
    name                  TEXT NOT NULL DEFAULT '',
    full_name             TEXT NOT NULL DEFAULT '',
    description           TEXT,
    brand                 TEXT NOT NULL DEFAULT '',
    industry              TEXT NOT NULL DEFAULT '',
    chemistry             TEXT,
    url                   TEXT,
    image                 TEXT,
    benefits              TEXT NOT NULL DEFAULT '[]',
    applications          TEXT NOT NULL DEFAULT '[]',
    technical             TEXT NOT NULL DEFAULT '[]',
    sizing                TEXT NOT NULL DEFAULT '[]',
    color                 TEXT,
    cleanup               TEXT,
    recommended_equipment TEXT,
    published             INTEGER NOT NULL DEFAULT 1,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL,
    last_edited           TEXT
);

CREATE INDEX IF NOT EXISTS idx_products_industry ON products(industry);
CREATE INDEX IF NOT EXISTS idx_products_chemistry ON products(chemistry);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Benefit count column",
            sql: r#"
ALTER TABLE products ADD COLUMN benefits_count INTEGER NOT NULL DEFAULT 0;

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
