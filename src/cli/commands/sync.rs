//! Sync command implementations (JSON snapshot export/import).
//!
//! Snapshots live in the sync directory: `--sync-dir`, else `PB_SYNC_DIR`,
//! else `./pb_sync` when present, else `pb_sync` next to the executable.

use crate::app::App;
use crate::cli::SyncCommands;
use crate::error::Result;
use crate::sync::{EntityStats, Exporter, Importer, get_sync_status, print_status};

/// Execute sync commands.
///
/// # Errors
///
/// Returns an error if the database cannot be read or a snapshot cannot be
/// written.
pub fn execute(command: &SyncCommands, app: &App, json: bool) -> Result<()> {
    match command {
        SyncCommands::Export { collection } => export(app, collection.as_deref(), json),
        SyncCommands::Import => import(app, json),
        SyncCommands::Status => status(app, json),
    }
}

fn export(app: &App, collection: Option<&str>, json: bool) -> Result<()> {
    let exporter = Exporter::new(app);
    let stats = exporter.export(collection)?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "output_dir": exporter.output_dir().display().to_string(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else if stats.collections.is_empty() {
        println!("No collections exported.");
    } else {
        println!("Export complete");
        println!();
        for (name, count) in &stats.collections {
            println!("  {name:<16} {count}");
        }
        println!();
        println!("  Total: {} records", stats.total());
        println!("  Location: {}", exporter.output_dir().display());
    }
    Ok(())
}

fn import(app: &App, json: bool) -> Result<()> {
    let importer = Importer::new(app);
    let stats = importer.import_all();

    if json {
        let output = serde_json::json!({
            "success": stats.total_failed() == 0,
            "import_dir": importer.input_dir().display().to_string(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("Import from: {}", importer.input_dir().display());
    println!();
    for (name, entity) in &stats.collections {
        print_entity_stats(name, entity);
    }
    println!();
    println!(
        "Total: {} saved, {} failed",
        stats.total_saved(),
        stats.total_failed()
    );
    Ok(())
}

fn print_entity_stats(name: &str, stats: &EntityStats) {
    if stats.skipped_file {
        println!("  {name:<16} skipped (no data)");
    } else {
        println!("  {name:<16} {} saved, {} failed", stats.saved, stats.failed);
    }
}

fn status(app: &App, json: bool) -> Result<()> {
    let status = get_sync_status(app, &app.sync_dir())?;

    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}
