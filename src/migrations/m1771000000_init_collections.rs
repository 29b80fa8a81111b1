//! Base schema: `users`, `lecture`, `chapters` and `mc_questions`.
//!
//! `mc_questions` is created in the shape that
//! `1771422155_updated_mc_questions` expects (rich-text `question` plus a
//! plain `qu` field).

use tracing::debug;

use crate::app::App;
use crate::error::{Error, Result};
use crate::model::Collection;

/// Collection snapshots, embedded at compile time.
const SNAPSHOT: &str = include_str!("../../migrations/1771000000_init_collections.json");

fn collections() -> Result<Vec<Collection>> {
    Ok(serde_json::from_str(SNAPSHOT)?)
}

pub fn up(app: &App) -> Result<()> {
    for collection in collections()? {
        debug!(collection = %collection.name, "Creating collection");
        app.save_collection(&collection)?;
    }
    Ok(())
}

pub fn down(app: &App) -> Result<()> {
    // referencing collections go first
    for collection in collections()?.iter().rev() {
        match app.find_collection_by_name_or_id(&collection.id) {
            Ok(existing) => app.delete_collection(&existing)?,
            Err(Error::CollectionNotFound { .. }) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
