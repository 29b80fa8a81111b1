//! SQLite storage implementation.
//!
//! Collections and records are persisted as JSON documents. Writes go through
//! [`SqliteStorage::mutate`] so every mutation runs in its own IMMEDIATE
//! transaction.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Collection;
use crate::storage::schema::apply_schema;

/// A stored record document: `(id, data)`.
pub type StoredRecord = (String, Map<String, Value>);

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation.
///
/// Passed to mutation closures so they can report what they touched.
#[derive(Debug, Default)]
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Rows changed by the operation.
    pub rows: usize,
}

impl MutationContext {
    #[must_use]
    pub fn new(op_name: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            rows: 0,
        }
    }
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5000)))?;

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation inside an IMMEDIATE transaction.
    ///
    /// The transaction is committed when the closure succeeds and rolled back
    /// (on drop) when it fails.
    ///
    /// # Errors
    ///
    /// Returns the closure's error or any transaction error.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op);
        let result = f(&tx, &mut ctx)?;

        tx.commit()?;
        debug!(op = ctx.op_name, rows = ctx.rows, "Mutation committed");

        Ok(result)
    }

    // ======================
    // Collection Operations
    // ======================

    /// Find a collection by id, falling back to name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored JSON is invalid.
    pub fn get_collection(&self, id_or_name: &str) -> Result<Option<Collection>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM _collections WHERE id = ?1
                 UNION ALL
                 SELECT data FROM _collections WHERE name = ?1 AND id != ?1
                 LIMIT 1",
                [id_or_name],
                |row| row.get(0),
            )
            .optional()?;

        data.map(|d| serde_json::from_str(&d).map_err(Error::from))
            .transpose()
    }

    /// List all collections ordered by creation.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored JSON is invalid.
    pub fn list_collections(&self) -> Result<Vec<Collection>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM _collections ORDER BY created_at ASC, rowid ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut collections = Vec::new();
        for row in rows {
            collections.push(serde_json::from_str(&row?)?);
        }
        Ok(collections)
    }

    /// Insert or replace a collection definition.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails (e.g. the name is
    /// taken by another collection).
    pub fn upsert_collection(&mut self, collection: &Collection) -> Result<()> {
        let data = serde_json::to_string(collection)?;
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("upsert_collection", |tx, ctx| {
            ctx.rows = tx.execute(
                "INSERT INTO _collections (id, name, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   data = excluded.data,
                   updated_at = excluded.updated_at",
                rusqlite::params![collection.id, collection.name, data, now],
            )?;
            Ok(())
        })
    }

    /// Delete a collection and all of its records.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_collection(&mut self, id: &str) -> Result<bool> {
        self.mutate("delete_collection", |tx, ctx| {
            tx.execute("DELETE FROM _records WHERE collection_id = ?1", [id])?;
            ctx.rows = tx.execute("DELETE FROM _collections WHERE id = ?1", [id])?;
            Ok(ctx.rows > 0)
        })
    }

    // ==================
    // Record Operations
    // ==================

    /// All records of a collection in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document is invalid.
    pub fn list_records(&self, collection_id: &str) -> Result<Vec<StoredRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, data FROM _records WHERE collection_id = ?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map([collection_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, data) = row?;
            records.push((id, serde_json::from_str(&data)?));
        }
        Ok(records)
    }

    /// Get one record document.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the document is invalid.
    pub fn get_record(&self, collection_id: &str, id: &str) -> Result<Option<Map<String, Value>>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM _records WHERE collection_id = ?1 AND id = ?2",
                [collection_id, id],
                |row| row.get(0),
            )
            .optional()?;

        data.map(|d| serde_json::from_str(&d).map_err(Error::from))
            .transpose()
    }

    /// Whether a record with this id exists in the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn record_exists(&self, collection_id: &str, id: &str) -> Result<bool> {
        let exists = self
            .conn
            .prepare("SELECT 1 FROM _records WHERE collection_id = ?1 AND id = ?2")?
            .exists([collection_id, id])?;
        Ok(exists)
    }

    /// Number of records in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_records(&self, collection_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM _records WHERE collection_id = ?1",
            [collection_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Whether another record in the collection already holds `value` in
    /// `field`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn field_value_taken(
        &self,
        collection_id: &str,
        field: &str,
        value: &Value,
        exclude_id: &str,
    ) -> Result<bool> {
        let path = format!("$.\"{}\"", field.replace('"', ""));
        let needle = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let taken = self
            .conn
            .prepare(
                "SELECT 1 FROM _records
                 WHERE collection_id = ?1 AND id != ?2
                   AND CAST(json_extract(data, ?3) AS TEXT) = ?4
                 LIMIT 1",
            )?
            .exists(rusqlite::params![collection_id, exclude_id, path, needle])?;
        Ok(taken)
    }

    /// Insert or replace a record document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn upsert_record(
        &mut self,
        collection_id: &str,
        id: &str,
        data: &Map<String, Value>,
    ) -> Result<()> {
        let doc = serde_json::to_string(data)?;
        self.mutate("upsert_record", |tx, ctx| {
            ctx.rows = tx.execute(
                "INSERT INTO _records (collection_id, id, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(collection_id, id) DO UPDATE SET data = excluded.data",
                rusqlite::params![collection_id, id, doc],
            )?;
            Ok(())
        })
    }

    /// Rewrite every record of a collection after a schema change: keys of
    /// removed fields are dropped, then renamed fields are moved.
    ///
    /// Returns the number of documents rewritten.
    ///
    /// # Errors
    ///
    /// Returns an error if a document cannot be read or written.
    pub fn rekey_records(
        &mut self,
        collection_id: &str,
        drops: &[String],
        renames: &[(String, String)],
    ) -> Result<usize> {
        if drops.is_empty() && renames.is_empty() {
            return Ok(0);
        }
        let records = self.list_records(collection_id)?;

        self.mutate("rekey_records", |tx, ctx| {
            let mut stmt =
                tx.prepare("UPDATE _records SET data = ?3 WHERE collection_id = ?1 AND id = ?2")?;
            for (id, mut data) in records {
                for key in drops {
                    data.remove(key);
                }
                for (from, to) in renames {
                    if let Some(value) = data.remove(from) {
                        data.insert(to.clone(), value);
                    }
                }
                let doc = serde_json::to_string(&data)?;
                ctx.rows += stmt.execute(rusqlite::params![collection_id, id, doc])?;
            }
            Ok(ctx.rows)
        })
    }

    /// Delete a record. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_record(&mut self, collection_id: &str, id: &str) -> Result<bool> {
        self.mutate("delete_record", |tx, ctx| {
            ctx.rows = tx.execute(
                "DELETE FROM _records WHERE collection_id = ?1 AND id = ?2",
                [collection_id, id],
            )?;
            Ok(ctx.rows > 0)
        })
    }

    // ======================
    // Migration Ledger
    // ======================

    /// Applied migration versions in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn applied_migrations(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT version, applied_at FROM _migrations ORDER BY version ASC")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Record a migration as applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn mark_migration_applied(&mut self, version: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("mark_migration_applied", |tx, ctx| {
            ctx.rows = tx.execute(
                "INSERT OR REPLACE INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now],
            )?;
            Ok(())
        })
    }

    /// Remove a migration from the ledger after it was reverted.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn unmark_migration(&mut self, version: &str) -> Result<()> {
        self.mutate("unmark_migration", |tx, ctx| {
            ctx.rows = tx.execute("DELETE FROM _migrations WHERE version = ?1", [version])?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lecture() -> Collection {
        serde_json::from_value(json!({
            "id": "pbc_1345586850",
            "name": "lecture",
            "type": "base",
            "fields": [
                {"id": "text3208210256", "name": "id", "type": "text"},
                {"id": "text724990059", "name": "title", "type": "text"}
            ]
        }))
        .unwrap()
    }

    fn doc(value: serde_json::Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_open_memory() {
        let storage = SqliteStorage::open_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_collection_lookup_by_id_or_name() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.upsert_collection(&lecture()).unwrap();

        let by_id = storage.get_collection("pbc_1345586850").unwrap().unwrap();
        let by_name = storage.get_collection("lecture").unwrap().unwrap();
        assert_eq!(by_id, by_name);
        assert!(storage.get_collection("missing").unwrap().is_none());
    }

    #[test]
    fn test_collection_rename_keeps_id() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut collection = lecture();
        storage.upsert_collection(&collection).unwrap();

        collection.name = "lectures".to_string();
        storage.upsert_collection(&collection).unwrap();

        assert!(storage.get_collection("lecture").unwrap().is_none());
        assert_eq!(storage.list_collections().unwrap().len(), 1);
    }

    #[test]
    fn test_record_crud() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.upsert_collection(&lecture()).unwrap();

        storage
            .upsert_record("pbc_1345586850", "a", &doc(json!({"title": "one"})))
            .unwrap();
        storage
            .upsert_record("pbc_1345586850", "b", &doc(json!({"title": "two"})))
            .unwrap();
        storage
            .upsert_record("pbc_1345586850", "a", &doc(json!({"title": "uno"})))
            .unwrap();

        let records = storage.list_records("pbc_1345586850").unwrap();
        assert_eq!(records.len(), 2);
        // upsert keeps insertion position
        assert_eq!(records[0].0, "a");
        assert_eq!(records[0].1["title"], "uno");

        assert!(storage.delete_record("pbc_1345586850", "a").unwrap());
        assert!(!storage.delete_record("pbc_1345586850", "a").unwrap());
        assert_eq!(storage.count_records("pbc_1345586850").unwrap(), 1);
    }

    #[test]
    fn test_field_value_taken() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.upsert_collection(&lecture()).unwrap();
        storage
            .upsert_record("pbc_1345586850", "a", &doc(json!({"title": "one"})))
            .unwrap();

        let value = json!("one");
        assert!(storage.field_value_taken("pbc_1345586850", "title", &value, "b").unwrap());
        assert!(!storage.field_value_taken("pbc_1345586850", "title", &value, "a").unwrap());
    }

    #[test]
    fn test_delete_collection_removes_records() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.upsert_collection(&lecture()).unwrap();
        storage
            .upsert_record("pbc_1345586850", "a", &doc(json!({"title": "one"})))
            .unwrap();

        assert!(storage.delete_collection("pbc_1345586850").unwrap());
        assert_eq!(storage.count_records("pbc_1345586850").unwrap(), 0);
    }

    #[test]
    fn test_rekey_records_drops_then_renames() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.upsert_collection(&lecture()).unwrap();
        storage
            .upsert_record(
                "pbc_1345586850",
                "a",
                &doc(json!({"question": "<p>old</p>", "qu": "plain"})),
            )
            .unwrap();

        let rows = storage
            .rekey_records(
                "pbc_1345586850",
                &["question".to_string()],
                &[("qu".to_string(), "question".to_string())],
            )
            .unwrap();
        assert_eq!(rows, 1);

        let data = storage.get_record("pbc_1345586850", "a").unwrap().unwrap();
        assert_eq!(data, doc(json!({"question": "plain"})));
    }

    #[test]
    fn test_migration_ledger() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.mark_migration_applied("2_b").unwrap();
        storage.mark_migration_applied("1_a").unwrap();

        let applied: Vec<String> = storage
            .applied_migrations()
            .unwrap()
            .into_iter()
            .map(|(v, _)| v)
            .collect();
        assert_eq!(applied, ["1_a", "2_b"]);

        storage.unmark_migration("2_b").unwrap();
        assert_eq!(storage.applied_migrations().unwrap().len(), 1);
    }
}
