//! JSON snapshot import.
//!
//! At server start the snapshots of the quiz collections are loaded back into
//! the database in a fixed order. Every failure is logged and skipped: a bad
//! file skips that collection, a bad record skips that record. Serving goes
//! ahead regardless.
//!
//! Records are saved through [`App::save`], so an id that already exists is
//! updated in place and importing the same files twice leaves the database
//! unchanged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::app::App;
use crate::error::Result;
use crate::hooks::{Next, ServeEvent};
use crate::model::Record;
use crate::model::record::{COLLECTION_ID_KEY, COLLECTION_NAME_KEY, CREATED_KEY, UPDATED_KEY};
use crate::sync::file::{read_snapshot, snapshot_path};
use crate::sync::types::{EntityStats, ImportStats};

/// Collections imported at startup, in order. Referenced collections must
/// come before the collections that point at them.
pub const IMPORT_ORDER: [&str; 3] = ["lecture", "chapters", "mc_questions"];

/// Keys removed from each snapshot object before it is loaded.
const STRIPPED_KEYS: [&str; 4] = [COLLECTION_ID_KEY, COLLECTION_NAME_KEY, CREATED_KEY, UPDATED_KEY];

/// Importer for collection snapshots.
pub struct Importer<'a> {
    app: &'a App,
    input_dir: PathBuf,
}

impl<'a> Importer<'a> {
    /// Importer reading from the app's current sync directory.
    #[must_use]
    pub fn new(app: &'a App) -> Self {
        let input_dir = app.sync_dir();
        Self { app, input_dir }
    }

    /// Importer reading from a custom directory.
    #[must_use]
    pub fn with_input_dir(app: &'a App, input_dir: PathBuf) -> Self {
        Self { app, input_dir }
    }

    #[must_use]
    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Import every collection of [`IMPORT_ORDER`]. Never fails.
    #[must_use]
    pub fn import_all(&self) -> ImportStats {
        let mut stats = ImportStats::default();
        for name in IMPORT_ORDER {
            stats
                .collections
                .push((name.to_string(), self.import_collection(name)));
        }
        stats
    }

    /// Import one snapshot file into the collection of the same name.
    #[must_use]
    pub fn import_collection(&self, name: &str) -> EntityStats {
        let mut stats = EntityStats::default();
        let path = snapshot_path(&self.input_dir, name);

        let items = match read_snapshot(&path) {
            Ok(items) => items,
            Err(err) => {
                error!(
                    collection = name,
                    path = %path.display(),
                    error = %err,
                    "Failed to read snapshot"
                );
                stats.skipped_file = true;
                return stats;
            }
        };
        if items.is_empty() {
            stats.skipped_file = true;
            return stats;
        }

        let collection = match self.app.find_collection_by_name_or_id(name) {
            Ok(collection) => collection,
            Err(err) => {
                error!(collection = name, error = %err, "Failed to find collection for snapshot");
                stats.skipped_file = true;
                return stats;
            }
        };

        for mut item in items {
            let mut record = Record::new(Arc::clone(&collection));
            if let Some(Value::String(id)) = item.remove("id") {
                record.set_id(id);
            }
            for key in STRIPPED_KEYS {
                item.remove(key);
            }
            record.load(item);

            let id = record.id().to_string();
            match self.app.save(record) {
                Ok(_) => stats.saved += 1,
                Err(err) => {
                    error!(collection = name, %id, error = %err, "Failed to import record");
                    stats.failed += 1;
                }
            }
        }

        info!(
            collection = name,
            saved = stats.saved,
            failed = stats.failed,
            "Imported snapshot"
        );
        stats
    }
}

/// Warn about collections in [`IMPORT_ORDER`] that are imported before a
/// collection they reference. Returns the warnings.
///
/// Collections missing from the schema are ignored here; the import itself
/// reports them.
#[must_use]
pub fn check_import_order(app: &App) -> Vec<String> {
    let mut warnings = Vec::new();

    for (position, name) in IMPORT_ORDER.iter().enumerate() {
        let Ok(collection) = app.find_collection_by_name_or_id(name) else {
            continue;
        };
        for target_id in collection.relation_targets() {
            if target_id == collection.id {
                continue;
            }
            let Ok(target) = app.find_collection_by_name_or_id(target_id) else {
                continue;
            };
            let later = IMPORT_ORDER
                .iter()
                .position(|n| *n == target.name)
                .is_some_and(|p| p > position);
            if later {
                let message = format!(
                    "{name} is imported before {}, which it references",
                    target.name
                );
                warn!(
                    collection = *name,
                    references = %target.name,
                    "Snapshot import order puts a collection before its relation target"
                );
                warnings.push(message);
            }
        }
    }
    warnings
}

/// Serve hook: import the snapshots, then continue starting the server.
///
/// # Errors
///
/// Only errors from later serve handlers are returned; import problems are
/// logged.
pub fn download_data(e: &mut ServeEvent, next: Next<'_, ServeEvent>) -> Result<()> {
    let importer = Importer::new(&e.app);
    let order_warnings = check_import_order(&e.app).len();

    let stats = importer.import_all();
    info!(
        dir = %importer.input_dir().display(),
        saved = stats.total_saved(),
        failed = stats.total_failed(),
        order_warnings,
        "Snapshot import finished"
    );

    next.run(e)
}
