//! Sync status display.
//!
//! Compares each collection in the database with its snapshot file: record
//! counts, file size, and whether a fresh export would produce the same
//! content.

use std::path::Path;

use colored::Colorize;
use serde_json::{Map, Value};

use crate::app::App;
use crate::error::Result;
use crate::sync::export::snapshot_row;
use crate::sync::file::{file_size, read_snapshot, snapshot_path};
use crate::sync::hash::{content_hash, has_changed};
use crate::sync::types::{CollectionSyncInfo, SyncStatus};

/// Get the current sync status for every collection.
///
/// # Errors
///
/// Returns an error if collections or records cannot be read. Unreadable
/// snapshot files are reported as out of sync, not as errors.
pub fn get_sync_status(app: &App, sync_dir: &Path) -> Result<SyncStatus> {
    let mut collections = Vec::new();

    for collection in app.find_all_collections()? {
        let rows: Vec<Map<String, Value>> = app
            .find_all_records(&collection.id)?
            .iter()
            .map(snapshot_row)
            .collect();

        let path = snapshot_path(sync_dir, &collection.name);
        let file_exists = path.exists();
        let file_rows = if file_exists {
            read_snapshot(&path).ok()
        } else {
            None
        };

        let current = content_hash(&rows)?;
        let stored = file_rows.as_ref().map(content_hash).transpose()?;
        let in_sync = !has_changed(&current, stored.as_deref());

        collections.push(CollectionSyncInfo {
            file: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            name: collection.name,
            records: rows.len(),
            file_exists,
            size: file_size(&path),
            file_records: file_rows.as_ref().map(Vec::len),
            in_sync,
        });
    }

    Ok(SyncStatus {
        sync_dir: sync_dir.display().to_string(),
        dir_exists: sync_dir.is_dir(),
        collections,
    })
}

/// Print sync status to stdout in a human-readable format.
pub fn print_status(status: &SyncStatus) {
    println!("{}", "Sync Status".bold().underline());
    println!();

    let dir_note = if status.dir_exists {
        String::new()
    } else {
        format!(" {}", "(missing)".yellow())
    };
    println!("{} {}{}", "Sync dir:".blue().bold(), status.sync_dir, dir_note);
    println!();

    if status.collections.is_empty() {
        println!("  {}", "No collections. Run `quizbase migrate up`.".dimmed());
        return;
    }

    for info in &status.collections {
        let state = if info.in_sync {
            "in sync".green()
        } else if !info.file_exists {
            "no snapshot".yellow()
        } else if info.file_records.is_none() {
            "unreadable".red()
        } else {
            "out of sync".yellow()
        };

        let file_count = info
            .file_records
            .map_or_else(|| "-".to_string(), |n| n.to_string());

        println!(
            "  {:<16} db: {:<5} file: {:<5} {:>8}  {}",
            info.name,
            info.records,
            file_count,
            format_size(info.size),
            state
        );
    }

    let out_of_sync = status.out_of_sync();
    println!();
    if out_of_sync == 0 {
        println!("{}", "All snapshots match the database.".green());
    } else {
        println!(
            "{} {}",
            format!("{out_of_sync} snapshot(s) differ.").yellow(),
            "Run `quizbase sync export` to rewrite them.".dimmed()
        );
    }
}

/// Format a file size in human-readable form.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::model::Record;
    use crate::sync::export::Exporter;
    use serde_json::json;
    use tempfile::TempDir;

    fn app(sync_dir: &Path) -> App {
        let config = AppConfig {
            sync_dir: Some(sync_dir.to_path_buf()),
            ..AppConfig::default()
        };
        let app = App::open_memory(config).unwrap();
        crate::migrations::run_pending(&app).unwrap();
        app
    }

    fn info<'a>(status: &'a SyncStatus, name: &str) -> &'a CollectionSyncInfo {
        status.collections.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn test_status_tracks_drift() {
        let temp = TempDir::new().unwrap();
        let app = app(temp.path());

        let status = get_sync_status(&app, temp.path()).unwrap();
        assert!(!info(&status, "lecture").file_exists);
        assert!(!info(&status, "lecture").in_sync);

        Exporter::new(&app).export(None).unwrap();
        let status = get_sync_status(&app, temp.path()).unwrap();
        assert_eq!(status.out_of_sync(), 0);

        let mut record = Record::new(app.find_collection_by_name_or_id("lecture").unwrap());
        record.set("title", json!("Intro"));
        app.create_record(record).unwrap();

        let status = get_sync_status(&app, temp.path()).unwrap();
        let lecture = info(&status, "lecture");
        assert_eq!(lecture.records, 1);
        assert_eq!(lecture.file_records, Some(0));
        assert!(!lecture.in_sync);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1_048_576), "1.0 MB");
    }
}
