//! Record command implementations.
//!
//! The CLI acts as a superuser: collection API rules are not applied, but
//! every mutation goes through the record hooks, so snapshots are exported
//! exactly as they are for HTTP writes.

use colored::Colorize;
use serde_json::{Map, Value};

use crate::app::App;
use crate::cli::RecordCommands;
use crate::error::{Error, Result};
use crate::model::{FieldKind, Record};

/// Execute record commands.
///
/// # Errors
///
/// Returns an error if the collection or record does not exist, the JSON
/// payload is not an object, or validation fails.
pub fn execute(command: &RecordCommands, app: &App, json: bool) -> Result<()> {
    match command {
        RecordCommands::List { collection } => list(app, collection, json),
        RecordCommands::Get { collection, id } => get(app, collection, id, json),
        RecordCommands::Create {
            collection,
            data,
            password,
        } => create(app, collection, data, password.as_deref(), json),
        RecordCommands::Update {
            collection,
            id,
            data,
            password,
        } => update(app, collection, id, data, password.as_deref(), json),
        RecordCommands::Delete { collection, id } => delete(app, collection, id, json),
    }
}

fn parse_object(data: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(data)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidArgument(format!(
            "record data must be a JSON object, got {other}"
        ))),
    }
}

/// Stage password values (flag first, then payload) and drop them from the
/// payload so the raw text is never stored.
fn stage_password(record: &mut Record, data: &mut Map<String, Value>, flag: Option<&str>) {
    let collection = record.collection_arc();
    let mut staged = flag.map(str::to_string);
    for field in collection.fields.iter().filter(|f| f.kind == FieldKind::Password) {
        if let Some(Value::String(plain)) = data.remove(&field.name) {
            staged.get_or_insert(plain);
        }
    }
    if let Some(plain) = staged {
        record.set_password(plain);
    }
}

/// Every field except password hashes, plus the collection identifiers.
fn cli_export(record: &Record) -> Map<String, Value> {
    let mut out = record.fields_data();
    for field in &record.collection().fields {
        if field.kind == FieldKind::Password {
            out.remove(&field.name);
        }
    }
    out.insert(
        "collectionName".to_string(),
        Value::String(record.collection().name.clone()),
    );
    out
}

fn print_record(record: &Record) {
    println!("{} {}", record.collection().name.dimmed(), record.id().bold());
    for (key, value) in cli_export(record) {
        if key == "id" || key == "collectionName" {
            continue;
        }
        let shown = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        println!("  {key:<16} {shown}");
    }
}

fn list(app: &App, collection: &str, json: bool) -> Result<()> {
    let records = app.find_all_records(collection)?;

    if json {
        let rows: Vec<Map<String, Value>> = records.iter().map(cli_export).collect();
        println!("{}", serde_json::to_string(&rows)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records in {collection}.");
        return Ok(());
    }
    for record in &records {
        print_record(record);
    }
    println!();
    println!("{} record(s)", records.len());
    Ok(())
}

fn get(app: &App, collection: &str, id: &str, json: bool) -> Result<()> {
    let record = app.find_record_by_id(collection, id)?;
    if json {
        println!("{}", serde_json::to_string(&cli_export(&record))?);
    } else {
        print_record(&record);
    }
    Ok(())
}

fn create(
    app: &App,
    collection: &str,
    data: &str,
    password: Option<&str>,
    json: bool,
) -> Result<()> {
    let collection = app.find_collection_by_name_or_id(collection)?;
    let mut data = parse_object(data)?;

    let mut record = Record::new(collection);
    stage_password(&mut record, &mut data, password);
    record.load(data);
    let saved = app.create_record(record)?;

    if json {
        println!("{}", serde_json::to_string(&cli_export(&saved))?);
    } else {
        println!("{} {}", "Created".green(), saved.id());
    }
    Ok(())
}

fn update(
    app: &App,
    collection: &str,
    id: &str,
    data: &str,
    password: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut record = app.find_record_by_id(collection, id)?;
    let mut data = parse_object(data)?;
    data.remove("id");

    stage_password(&mut record, &mut data, password);
    record.load(data);
    let saved = app.update_record(record)?;

    if json {
        println!("{}", serde_json::to_string(&cli_export(&saved))?);
    } else {
        println!("{} {}", "Updated".green(), saved.id());
    }
    Ok(())
}

fn delete(app: &App, collection: &str, id: &str, json: bool) -> Result<()> {
    let record = app.find_record_by_id(collection, id)?;
    app.delete_record(record)?;

    if json {
        let output = serde_json::json!({ "deleted": id });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{} {id}", "Deleted".yellow());
    }
    Ok(())
}
