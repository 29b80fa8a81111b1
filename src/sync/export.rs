//! JSON snapshot export.
//!
//! # Snapshot Mode
//!
//! Each collection is written to `<sync dir>/<collection>.json` as the full
//! current state: one flat object per record, without the `created` and
//! `updated` housekeeping fields. Git tracks the history.
//!
//! The same code backs the record hooks (export after every committed
//! mutation) and `quizbase sync export`.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::app::App;
use crate::error::Result;
use crate::hooks::{Next, RecordEvent};
use crate::model::Collection;
use crate::model::Record;
use crate::model::record::{CREATED_KEY, UPDATED_KEY};
use crate::sync::file::{ensure_dir, snapshot_path, write_snapshot};
use crate::sync::types::ExportStats;

/// Exporter for collection snapshots.
pub struct Exporter<'a> {
    app: &'a App,
    output_dir: PathBuf,
}

impl<'a> Exporter<'a> {
    /// Exporter writing to the app's current sync directory.
    #[must_use]
    pub fn new(app: &'a App) -> Self {
        let output_dir = app.sync_dir();
        Self { app, output_dir }
    }

    /// Exporter writing to a custom directory.
    #[must_use]
    pub fn with_output_dir(app: &'a App, output_dir: PathBuf) -> Self {
        Self { app, output_dir }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Rewrite the snapshot of one collection. Returns the record count.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the records
    /// cannot be read, or the file cannot be written.
    pub fn export_collection(&self, collection: &Collection) -> Result<usize> {
        ensure_dir(&self.output_dir)?;

        let rows: Vec<Map<String, Value>> = self
            .app
            .find_all_records(&collection.id)?
            .iter()
            .map(snapshot_row)
            .collect();

        let path = snapshot_path(&self.output_dir, &collection.name);
        write_snapshot(&path, &rows)?;
        debug!(
            collection = %collection.name,
            records = rows.len(),
            path = %path.display(),
            "Exported snapshot"
        );
        Ok(rows.len())
    }

    /// Export every collection, or only `only` when given.
    ///
    /// # Errors
    ///
    /// Returns the first collection that fails to export.
    pub fn export(&self, only: Option<&str>) -> Result<ExportStats> {
        let collections = match only {
            Some(name) => vec![(*self.app.find_collection_by_name_or_id(name)?).clone()],
            None => self.app.find_all_collections()?,
        };

        let mut stats = ExportStats::default();
        for collection in &collections {
            let count = self.export_collection(collection)?;
            stats.collections.insert(collection.name.clone(), count);
        }
        Ok(stats)
    }
}

/// Snapshot form of a record: every field, minus `created` and `updated`.
#[must_use]
pub fn snapshot_row(record: &Record) -> Map<String, Value> {
    let mut row = record.fields_data();
    row.remove(CREATED_KEY);
    row.remove(UPDATED_KEY);
    row
}

/// Record hook: let the mutation commit, then rewrite the collection's
/// snapshot.
///
/// If the mutation fails nothing is exported and its error is returned. An
/// export failure is logged and returned even though the mutation has
/// already committed.
///
/// # Errors
///
/// Returns the mutation error or the export error.
pub fn upload_data(e: &mut RecordEvent, next: Next<'_, RecordEvent>) -> Result<()> {
    next.run(e)?;

    let collection = e.record.collection();
    let exporter = Exporter::new(&e.app);
    if let Err(err) = exporter.export_collection(collection) {
        error!(
            collection = %collection.name,
            record = e.record.id(),
            dir = %exporter.output_dir().display(),
            error = %err,
            "Failed to export collection snapshot"
        );
        return Err(err);
    }
    Ok(())
}
