//! SQL schema for the feedstash SQLite files.
//!
//! The items schema is the post-migration target state; `ensure_schema`
//! creates it on a database that has no items table at all. Databases that
//! predate the uniqueness constraint are brought forward by the migration
//! scripts instead.

/// Items table and its secondary indexes; idempotent.
pub const ITEMS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS items (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    source_identity  TEXT NOT NULL,
    source_reference TEXT NOT NULL,
    raw_timestamp    TEXT NOT NULL,
    parsed_timestamp TEXT,           -- ISO 8601, NULL when unparseable
    body_text        TEXT NOT NULL,
    received_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (source_identity, source_reference, body_text)
);

CREATE INDEX IF NOT EXISTS idx_items_parsed_timestamp ON items(parsed_timestamp);
CREATE INDEX IF NOT EXISTS idx_items_source_identity  ON items(source_identity);
CREATE INDEX IF NOT EXISTS idx_items_body_text        ON items(body_text);
CREATE INDEX IF NOT EXISTS idx_items_source_reference ON items(source_reference);
";

/// Name of the table recording applied migrations.
pub const TRACKING_TABLE: &str = "schema_migrations";

/// Migration tracking table; idempotent.
pub const TRACKING_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS schema_migrations (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    filename   TEXT UNIQUE NOT NULL,
    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
";

/// Search-index document table; idempotent.
pub const INDEX_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS documents (
    doc_id        TEXT PRIMARY KEY,
    body          TEXT NOT NULL,
    metadata_json TEXT NOT NULL,
    embedding     BLOB NOT NULL   -- little-endian f32 values
);
";
