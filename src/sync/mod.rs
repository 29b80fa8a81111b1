//! JSON snapshot sync.
//!
//! This module keeps a git-friendly copy of the quiz content next to the
//! database:
//!
//! - **Export**: after every committed record mutation, the collection's
//!   full snapshot is rewritten to `<sync dir>/<collection>.json`
//! - **Import**: at server start, the snapshots of `lecture`, `chapters` and
//!   `mc_questions` are loaded back, in that order
//! - **Status**: compare the database with the snapshot files
//!
//! # File Format
//!
//! Each file is a 2-space indented JSON array of flat record objects with
//! sorted keys, without `created` / `updated`:
//! ```json
//! [
//!   {
//!     "id": "k3v9x0q2m1a7b4c",
//!     "index": 1,
//!     "lessons": [],
//!     "title": "Basics"
//!   }
//! ]
//! ```
//!
//! # Example
//!
//! ```ignore
//! let app = App::new(config)?;
//! quizbase::sync::register(&app);     // export on write, import on serve
//!
//! let stats = Exporter::new(&app).export(None)?;
//! let status = status::get_sync_status(&app, &app.sync_dir())?;
//! ```

mod export;
mod file;
mod hash;
mod import;
mod status;
mod types;

use crate::app::App;

// Re-export main types and functions
pub use export::{Exporter, snapshot_row, upload_data};
pub use file::{atomic_write, ensure_dir, file_size, read_snapshot, snapshot_path, write_snapshot};
pub use hash::{content_hash, has_changed};
pub use import::{IMPORT_ORDER, Importer, check_import_order, download_data};
pub use status::{get_sync_status, print_status};
pub use types::{
    CollectionSyncInfo, EntityStats, ExportStats, ImportStats, SyncError, SyncResult, SyncStatus,
};

/// Bind [`upload_data`] to record create, update and delete, and
/// [`download_data`] to serve.
pub fn register(app: &App) {
    let hooks = app.hooks();
    hooks.on_record_create.bind(upload_data);
    hooks.on_record_update.bind(upload_data);
    hooks.on_record_delete.bind(upload_data);
    hooks.on_serve.bind(download_data);
}
