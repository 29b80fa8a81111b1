//! Collection command implementations.

use colored::Colorize;

use crate::app::App;
use crate::cli::CollectionCommands;
use crate::error::Result;

/// Execute collection commands.
///
/// # Errors
///
/// Returns an error if the collection does not exist or cannot be read.
pub fn execute(command: &CollectionCommands, app: &App, json: bool) -> Result<()> {
    match command {
        CollectionCommands::List => list(app, json),
        CollectionCommands::Show { collection } => show(app, collection, json),
    }
}

fn list(app: &App, json: bool) -> Result<()> {
    let collections = app.find_all_collections()?;

    if json {
        let mut rows = Vec::with_capacity(collections.len());
        for collection in &collections {
            rows.push(serde_json::json!({
                "id": collection.id,
                "name": collection.name,
                "type": collection.kind,
                "fields": collection.fields.len(),
                "records": app.count_records(collection)?,
            }));
        }
        println!("{}", serde_json::to_string(&rows)?);
        return Ok(());
    }

    if collections.is_empty() {
        println!("No collections. Run `quizbase migrate up`.");
        return Ok(());
    }
    for collection in &collections {
        println!(
            "  {:<16} {:<16} {:>3} fields {:>6} records",
            collection.name.bold(),
            collection.id.dimmed(),
            collection.fields.len(),
            app.count_records(collection)?
        );
    }
    Ok(())
}

fn show(app: &App, name: &str, json: bool) -> Result<()> {
    let collection = app.find_collection_by_name_or_id(name)?;

    if json {
        println!("{}", serde_json::to_string(&*collection)?);
        return Ok(());
    }

    println!("{} ({})", collection.name.bold(), collection.id.dimmed());
    println!();
    for field in &collection.fields {
        let mut flags = Vec::new();
        if field.required {
            flags.push("required");
        }
        if field.hidden {
            flags.push("hidden");
        }
        if field.presentable {
            flags.push("presentable");
        }
        println!(
            "  {:<16} {:<10} {}",
            field.name,
            format!("{:?}", field.kind).to_lowercase(),
            flags.join(", ").dimmed()
        );
    }
    Ok(())
}
