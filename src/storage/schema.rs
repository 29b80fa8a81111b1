//! Database schema definitions.
//!
//! Collections and records are stored as JSON documents: one table for
//! collection definitions, one for all records keyed by collection id, and a
//! ledger of applied migrations.

use rusqlite::{Connection, Result};

/// Current system schema version.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The SQL schema for the system tables.
///
/// Timestamps of records live inside the JSON document (`created`,
/// `updated`); `applied_at` is Unix milliseconds.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS _params (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Collections: schema snapshots, addressable by id or unique name
CREATE TABLE IF NOT EXISTS _collections (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    data TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Records: one JSON document per row
CREATE TABLE IF NOT EXISTS _records (
    collection_id TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    PRIMARY KEY (collection_id, id),
    FOREIGN KEY (collection_id) REFERENCES _collections(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_records_collection ON _records(collection_id);

-- Applied collection migrations
CREATE TABLE IF NOT EXISTS _migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
";

/// Apply pragmas and the system schema. Idempotent.
///
/// # Errors
///
/// Returns an error if a pragma or DDL statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR REPLACE INTO _params (key, value) VALUES ('schema_version', ?1)",
        [CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}
